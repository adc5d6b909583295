use anyhow::{Context, Error};
use getopts::Options;
use log::*;
use logosaurus::{self, Logger, L_LEVEL, L_TIME};
use reqwest::Client;
use spotifycli::access_token::{CookieSource, SP_DC_INSTRUCTIONS};
use spotifycli::token_cache::{self, TokenStore, CACHE_DIR_ENV};
use spotifycli::token_class::TokenClass;
use std::env;
use std::io;
use std::process;

#[tokio::main]
async fn main() {
    let logger = Logger::builder(io::stderr())
        .set_prefix("spotifycli: ")
        .set_flags(L_LEVEL | L_TIME)
        .set_level(LevelFilter::Info)
        .build();
    logosaurus::init(logger).unwrap();

    let args = env::args().collect::<Vec<String>>();
    let mut opts = Options::new();
    opts.optopt(
        "c",
        "class",
        "token class: modify, read or library-read (default: modify)",
        "CLASS",
    );
    opts.optopt(
        "",
        "cache-dir",
        &format!("cache directory (default: ${} or the user cache dir)", CACHE_DIR_ENV),
        "DIR",
    );
    opts.optflag("h", "help", "print this help");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprint!("{}\n\n", e);
            print_help(&args[0], &opts);
            process::exit(2);
        }
    };
    if matches.opt_present("h") {
        print_help(&args[0], &opts);
        return;
    }
    if matches.free.len() != 2 {
        print_help(&args[0], &opts);
        process::exit(2);
    }

    if let Err(e) = run(&matches).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(matches: &getopts::Matches) -> Result<(), Error> {
    let class = match matches.opt_str("c") {
        Some(s) => s.parse::<TokenClass>()?,
        None => TokenClass::Modify,
    };
    let dir = token_cache::cache_dir(matches.opt_str("cache-dir").as_deref())?;
    let store = TokenStore::for_class(&dir, class);
    debug!(
        "using {} for {} token ({})",
        store.path().display(),
        class,
        class.scopes()
    );

    let source = CookieSource::new(Client::new(), &matches.free[0], &matches.free[1]);
    let token = token_cache::get_or_fetch(&store, &source)
        .await
        .with_context(|| format!("get {} token", class))?;
    println!("{}", token);
    Ok(())
}

fn print_help(prog: &str, opts: &Options) {
    let brief = format!("usage: {} [options] <SP_DC> <SP_KEY>", prog);
    eprint!("{}\n", opts.usage(&brief));
    eprint!("To obtain SP_DC and SP_KEY:\n");
    eprint!("{}\n", SP_DC_INSTRUCTIONS);
}
