use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};

/// Independently scoped credential. Each class is cached in its own file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Modify,
    Read,
    LibraryRead,
}

impl TokenClass {
    pub const ALL: [TokenClass; 3] = [TokenClass::Modify, TokenClass::Read, TokenClass::LibraryRead];

    /// Name of the cache file for this class, relative to the cache directory.
    pub fn file_name(self) -> &'static str {
        match self {
            TokenClass::Modify => "modify_token",
            TokenClass::Read => "read_token",
            TokenClass::LibraryRead => "library_read_token",
        }
    }

    pub fn scopes(self) -> &'static str {
        match self {
            TokenClass::Modify => "user-modify-playback-state",
            TokenClass::Read => "user-read-playback-state",
            TokenClass::LibraryRead => "user-library-read",
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenClass::Modify => "modify",
            TokenClass::Read => "read",
            TokenClass::LibraryRead => "library-read",
        };
        f.write_str(s)
    }
}

impl FromStr for TokenClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        TokenClass::ALL
            .iter()
            .copied()
            .find(|c| c.to_string() == s)
            .ok_or_else(|| anyhow!("unknown token class: {:?}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_names() {
        for class in TokenClass::ALL.iter() {
            assert_eq!(class.to_string().parse::<TokenClass>().unwrap(), *class);
        }
        assert!("write".parse::<TokenClass>().is_err());
    }

    #[test]
    fn file_names_are_distinct() {
        assert_ne!(TokenClass::Modify.file_name(), TokenClass::Read.file_name());
        assert_ne!(TokenClass::Read.file_name(), TokenClass::LibraryRead.file_name());
        assert_ne!(TokenClass::Modify.file_name(), TokenClass::LibraryRead.file_name());
    }
}
