//! Per-family policy: where archives live, how years alias, and how
//! archive entries are named.

use std::{fmt, str::FromStr};
use thiserror::Error;
use tracing::info;

use crate::schema::{ArchiveLocator, Year};

/// The survey programs this crate knows how to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Survey {
    /// Pesquisa Nacional por Amostra de Domicílios (household survey).
    Pnad,
    /// Pesquisa de Orçamentos Familiares (budget survey).
    Pof,
}

/// How an archive lays out its table entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryNaming {
    /// `MORADOR.txt`
    Flat,
    /// `Dados/DOM2015.txt`; the first path segment is dropped.
    Nested,
}

impl Survey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Survey::Pnad => "pnad",
            Survey::Pof => "pof",
        }
    }

    /// File name of the family's schema document inside the schema directory.
    pub fn schema_file(&self) -> &'static str {
        match self {
            Survey::Pnad => "pnad.yml",
            Survey::Pof => "pof.yml",
        }
    }

    pub fn entry_naming(&self) -> EntryNaming {
        match self {
            Survey::Pnad => EntryNaming::Nested,
            Survey::Pof => EntryNaming::Flat,
        }
    }

    /// The 2017/2018 budget survey is published under its starting year.
    pub fn normalize_year(&self, requested: Year) -> Year {
        match (self, requested) {
            (Survey::Pof, 2018) => {
                info!(survey = %self, requested, effective = 2017, "year alias applied");
                2017
            }
            _ => requested,
        }
    }

    pub fn remote_address(&self, base: &str, year: Year, locator: &ArchiveLocator) -> String {
        match self {
            Survey::Pnad => format!("{}{}/{}", base, year, locator.filename),
            Survey::Pof => format!("{}{}", base, locator.filename),
        }
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown survey `{0}`; expected `pnad` or `pof`")]
pub struct UnknownSurvey(pub String);

impl FromStr for Survey {
    type Err = UnknownSurvey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pnad" => Ok(Survey::Pnad),
            "pof" => Ok(Survey::Pof),
            _ => Err(UnknownSurvey(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_budget_survey_aliases_2018() {
        assert_eq!(Survey::Pof.normalize_year(2018), 2017);
        assert_eq!(Survey::Pof.normalize_year(2008), 2008);
        assert_eq!(Survey::Pnad.normalize_year(2018), 2018);
    }

    #[test]
    fn remote_addresses_follow_family_layout() {
        let loc = ArchiveLocator {
            filename: "dados.zip".into(),
        };
        assert_eq!(
            Survey::Pnad.remote_address("https://h/pnad/", 2015, &loc),
            "https://h/pnad/2015/dados.zip"
        );
        assert_eq!(
            Survey::Pof.remote_address("https://h/pof/", 2017, &loc),
            "https://h/pof/dados.zip"
        );
    }

    #[test]
    fn parses_family_names() {
        assert_eq!("PNAD".parse::<Survey>().unwrap(), Survey::Pnad);
        assert_eq!(" pof ".parse::<Survey>().unwrap(), Survey::Pof);
        assert!("census".parse::<Survey>().is_err());
        assert_eq!(Survey::Pof.to_string(), "pof");
    }
}
