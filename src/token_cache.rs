//! On-disk cache of a single bearer token per [`TokenClass`].
//!
//! The cache file holds `key=value` lines:
//!
//! ```text
//! jwtToken=<bearer token>
//! expiresIn=<RFC 3339 timestamp>
//! ```
//!
//! Unknown or malformed lines are ignored. Reading never fails: every problem
//! (I/O, missing keys, bad timestamp, expiry) is reported as a [`Lookup::Miss`]
//! and the caller is expected to re-authenticate.

use std::env;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str;

use anyhow::{anyhow, bail, Context, Error};
use chrono::{DateTime, SecondsFormat, Utc};
use log::*;
use tempfile::NamedTempFile;

use crate::access_token::TokenSource;
use crate::token_class::TokenClass;

const TOKEN_KEY: &str = "jwtToken";
const EXPIRY_KEY: &str = "expiresIn";

pub const CACHE_DIR_ENV: &str = "SPOTIFYCLI_CACHE_DIR";

pub fn cache_dir(explicit: Option<&str>) -> Result<PathBuf, Error> {
    if let Some(dir) = explicit {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = env::var_os(CACHE_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::cache_dir()
        .map(|d| d.join("spotifycli"))
        .ok_or_else(|| anyhow!("no cache directory found; set {}", CACHE_DIR_ENV))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(String),
    Miss(MissReason),
}

impl Lookup {
    pub fn into_token(self) -> String {
        match self {
            Lookup::Hit(token) => token,
            Lookup::Miss(_) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    Io,
    MissingToken,
    MissingExpiry,
    InvalidExpiry,
    Expired,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MissReason::Io => "cache file unreadable",
            MissReason::MissingToken => "no token",
            MissReason::MissingExpiry => "no expiry",
            MissReason::InvalidExpiry => "invalid expiry",
            MissReason::Expired => "token expired",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> TokenStore {
        TokenStore { path: path.into() }
    }

    pub fn for_class(dir: &Path, class: TokenClass) -> TokenStore {
        TokenStore::new(dir.join(class.file_name()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached token if it is still valid, or an empty string.
    pub fn read_valid_token(&self) -> String {
        self.lookup().into_token()
    }

    pub fn lookup(&self) -> Lookup {
        self.lookup_at(Utc::now())
    }

    pub fn lookup_at(&self, now: DateTime<Utc>) -> Lookup {
        let file = match self.open() {
            Ok(f) => f,
            Err(e) => {
                debug!("open {}: {}", self.path.display(), e);
                return Lookup::Miss(MissReason::Io);
            }
        };

        let record = match Record::scan(BufReader::new(file)) {
            Ok(r) => r,
            Err(e) => {
                debug!("read {}: {}", self.path.display(), e);
                return Lookup::Miss(MissReason::Io);
            }
        };

        let lookup = record.check(now);
        match &lookup {
            Lookup::Hit(_) => info!("token cache hit"),
            Lookup::Miss(MissReason::Expired) => info!("token expired, getting a new one"),
            Lookup::Miss(reason) => debug!("token cache miss: {}", reason),
        }
        lookup
    }

    // Write-then-rename: readers see either the old record or the new one.
    pub fn store(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), Error> {
        if token.is_empty() {
            bail!("refusing to cache empty token");
        }
        if token.contains(|c: char| c == '\n' || c == '\r') {
            bail!("token contains a line break");
        }

        let dir = self.dir();
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(dir).context("create temporary file")?;
        write!(
            tmp,
            "{}={}\n{}={}\n",
            TOKEN_KEY,
            token,
            EXPIRY_KEY,
            expires_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        )
        .context("write temporary file")?;
        tmp.as_file().sync_all().context("sync temporary file")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("replace {}", self.path.display()))?;

        debug!("cached token in {}", self.path.display());
        Ok(())
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    // Creates the file (and its directory) when absent; an empty file is an
    // empty cache.
    fn open(&self) -> io::Result<File> {
        fs::create_dir_all(self.dir())?;
        let mut opts = OpenOptions::new();
        opts.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        opts.open(&self.path)
    }
}

/// Returns the cached token when valid; otherwise fetches one from `source`
/// and caches it. A failure to cache is logged and the fresh token is still
/// returned.
pub async fn get_or_fetch<S: TokenSource>(store: &TokenStore, source: &S) -> Result<String, Error> {
    if let Lookup::Hit(token) = store.lookup() {
        return Ok(token);
    }

    let fresh = source.fetch_token().await.context("fetch access token")?;
    if let Err(e) = store.store(&fresh.token, fresh.expires_at) {
        warn!("{:#}; token not cached", e);
    }
    Ok(fresh.token)
}

#[derive(Debug, Default)]
struct Record {
    token: String,
    expires_in: String,
}

impl Record {
    fn scan<R: BufRead>(r: R) -> io::Result<Record> {
        let mut rec = Record::default();
        for line in r.split(b'\n') {
            let line = line?;
            let line = match str::from_utf8(&line) {
                Ok(l) => l,
                Err(_) => continue,
            };
            let line = line.strip_suffix('\r').unwrap_or(line);
            let (key, value) = match line.split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            match key {
                TOKEN_KEY => rec.token = value.to_string(),
                EXPIRY_KEY => rec.expires_in = value.to_string(),
                _ => {}
            }
        }
        Ok(rec)
    }

    fn check(self, now: DateTime<Utc>) -> Lookup {
        if self.token.is_empty() {
            return Lookup::Miss(MissReason::MissingToken);
        }
        if self.expires_in.is_empty() {
            return Lookup::Miss(MissReason::MissingExpiry);
        }

        let expires_at = match DateTime::parse_from_rfc3339(&self.expires_in) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                warn!("parse {} {:?}: {}", EXPIRY_KEY, self.expires_in, e);
                return Lookup::Miss(MissReason::InvalidExpiry);
            }
        };

        if now >= expires_at {
            return Lookup::Miss(MissReason::Expired);
        }
        Lookup::Hit(self.token)
    }
}
