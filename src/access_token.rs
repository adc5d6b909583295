// Code adapated from https://github.com/enriquegh/spotify-webplayer-token
//
// MIT License
//
// Copyright (c) 2018 Enrique Gonzalez
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use anyhow::{anyhow, Context, Error};
use chrono::{DateTime, Utc};
use cookie::Cookie;
use serde::Deserialize;

pub const SP_DC_INSTRUCTIONS: &str = r"1. open a new incognito window in a browser at: https://accounts.spotify.com/en/login?continue=https:%2F%2Fopen.spotify.com%2F
2. open Developer Tools in your browser and select the 'Application' tab
3. login to Spotify
4. search/filter for `sp_dc` under Cookies > https://open.spotify.com
5. repeat step 4 for `sp_key`
6. close the window without logging out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[allow(async_fn_in_trait)]
pub trait TokenSource {
    async fn fetch_token(&self) -> Result<FreshToken, Error>;
}

/// Web-player tokens from a logged-in session's `sp_dc` and `sp_key` cookies.
pub struct CookieSource {
    client: reqwest::Client,
    sp_dc: String,
    sp_key: String,
}

impl CookieSource {
    pub fn new(client: reqwest::Client, sp_dc: &str, sp_key: &str) -> CookieSource {
        CookieSource {
            client,
            sp_dc: sp_dc.to_string(),
            sp_key: sp_key.to_string(),
        }
    }
}

impl TokenSource for CookieSource {
    async fn fetch_token(&self) -> Result<FreshToken, Error> {
        let rsp = fetch(&self.client, &self.sp_dc, &self.sp_key).await?;
        let expires_at = rsp
            .expires_at()
            .ok_or_else(|| anyhow!("expiry out of range: {}", rsp.expiry_ms))?;
        Ok(FreshToken {
            token: rsp.access_token,
            expires_at,
        })
    }
}

pub async fn fetch(c: &reqwest::Client, sp_dc: &str, sp_key: &str) -> Result<TokenResponse, Error> {
    const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_2) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/63.0.3239.132 Safari/537.36";
    const URL: &str =
        "https://open.spotify.com/get_access_token?reason=transport&productType=web_player";

    let req = c
        .get(URL)
        .header("user-agent", USER_AGENT)
        .header("cookie", cookie_header(sp_dc, sp_key))
        .build()
        .context("build request")?;
    let rsp = c.execute(req).await.context("execute request")?;

    if !rsp.status().is_success() {
        return Err(anyhow!("bad response status: {}", rsp.status()));
    }
    let tok = rsp.json::<TokenResponse>().await.context("json deserialize")?;
    if tok.access_token.is_empty() {
        return Err(anyhow!("empty access token in response"));
    }
    Ok(tok)
}

fn cookie_header(sp_dc: &str, sp_key: &str) -> String {
    let cookies = vec![Cookie::new("sp_dc", sp_dc), Cookie::new("sp_key", sp_key)];
    cookies
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<String>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "accessTokenExpirationTimestampMs")]
    pub expiry_ms: i64,
}

impl TokenResponse {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expiry_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_joins_both_cookies() {
        assert_eq!(cookie_header("dc", "key"), "sp_dc=dc; sp_key=key");
    }

    #[test]
    fn expiry_from_millis() {
        let rsp = TokenResponse {
            access_token: "abc".to_string(),
            expiry_ms: 1_704_207_845_500,
        };
        assert_eq!(
            rsp.expires_at().unwrap().to_rfc3339(),
            "2024-01-02T15:04:05.500+00:00"
        );

        let rsp = TokenResponse {
            access_token: "abc".to_string(),
            expiry_ms: i64::MAX,
        };
        assert!(rsp.expires_at().is_none());
    }
}
