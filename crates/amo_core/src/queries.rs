//! Reporting queries against the AMO database replica.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sql::{quote_literal, SqlBuilder, SqlError, Table};

/// Add-on identifiers the reporting queries can map between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonColumn {
    Id,
    Guid,
    Slug,
}

impl AddonColumn {
    pub fn name(self) -> &'static str {
        match self {
            AddonColumn::Id => "id",
            AddonColumn::Guid => "guid",
            AddonColumn::Slug => "slug",
        }
    }

    /// SQL literal for one identifier. Ids must be numeric, the rest are quoted.
    pub fn literal(self, value: &str) -> Result<String, SqlError> {
        match self {
            AddonColumn::Id => value
                .trim()
                .parse::<u64>()
                .map(|id| id.to_string())
                .map_err(|_| SqlError::NonNumericId {
                    column: self.name(),
                    value: value.to_string(),
                }),
            AddonColumn::Guid | AddonColumn::Slug => Ok(quote_literal(value)),
        }
    }

    fn literal_list<S: AsRef<str>>(self, values: &[S]) -> Result<String, SqlError> {
        if values.is_empty() {
            return Err(SqlError::EmptyIdList);
        }
        let literals = values
            .iter()
            .map(|value| self.literal(value.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(literals.join(", "))
    }
}

impl fmt::Display for AddonColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown add-on {kind} {value:?}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for AddonColumn {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(AddonColumn::Id),
            "guid" => Ok(AddonColumn::Guid),
            "slug" => Ok(AddonColumn::Slug),
            _ => Err(UnknownName {
                kind: "column",
                value: s.to_string(),
            }),
        }
    }
}

/// `addontype_id` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonType {
    Extension,
    Theme,
    Dictionary,
    Search,
    LanguagePack,
    LanguageAddon,
    Plugin,
    LightweightTheme,
    StaticTheme,
}

impl AddonType {
    pub const ALL: [AddonType; 9] = [
        AddonType::Extension,
        AddonType::Theme,
        AddonType::Dictionary,
        AddonType::Search,
        AddonType::LanguagePack,
        AddonType::LanguageAddon,
        AddonType::Plugin,
        AddonType::LightweightTheme,
        AddonType::StaticTheme,
    ];

    pub fn code(self) -> u8 {
        match self {
            AddonType::Extension => 1,
            AddonType::Theme => 2,
            AddonType::Dictionary => 3,
            AddonType::Search => 4,
            AddonType::LanguagePack => 5,
            AddonType::LanguageAddon => 6,
            AddonType::Plugin => 7,
            AddonType::LightweightTheme => 9,
            AddonType::StaticTheme => 10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AddonType::Extension => "extension",
            AddonType::Theme => "theme",
            AddonType::Dictionary => "dictionary",
            AddonType::Search => "search",
            AddonType::LanguagePack => "lpapp",
            AddonType::LanguageAddon => "lpaddon",
            AddonType::Plugin => "plugin",
            AddonType::LightweightTheme => "lwtheme",
            AddonType::StaticTheme => "statictheme",
        }
    }
}

impl fmt::Display for AddonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AddonType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownName {
                kind: "type",
                value: s.to_string(),
            })
    }
}

/// Selects `from` and `to` for every add-on whose `from` is in `ids`.
pub fn map_ids_query<S: AsRef<str>>(
    from: AddonColumn,
    to: AddonColumn,
    ids: &[S],
) -> Result<String, SqlError> {
    let list = from.literal_list(ids)?;
    Ok(SqlBuilder::from(Table::Addons)
        .select([format!("a.{from}"), format!("a.{to}")])
        .and_where(format!("a.{from} IN ({list})"))
        .build())
}

/// Every non-null value of `column` across all add-ons.
pub fn all_ids_query(column: AddonColumn) -> String {
    SqlBuilder::from(Table::Addons)
        .select([format!("a.{column}")])
        .and_where(format!("a.{column} IS NOT NULL"))
        .build()
}

/// Developer accounts of the add-ons whose `column` is in `ids`.
pub fn users_for_ids_query<S: AsRef<str>>(
    column: AddonColumn,
    ids: &[S],
) -> Result<String, SqlError> {
    let list = column.literal_list(ids)?;
    Ok(SqlBuilder::from(Table::AddonsUsers)
        .select(["au.user_id", "u.display_name", "u.username"])
        .join(Table::Addons)?
        .join(Table::Users)?
        .and_where(format!("a.{column} IN ({list})"))
        .group_by("au.user_id")
        .build())
}

/// GUIDs prefixed by this are placeholders left behind by deleted add-ons.
pub const REUSED_GUID_PREFIX: &str = "guid-reused-by-pk-";

/// Every add-on of the given types owned by an account that also owns one
/// of `guids`.
pub fn involved_accounts_query<S: AsRef<str>>(
    guids: &[S],
    types: &[AddonType],
) -> Result<String, SqlError> {
    let list = AddonColumn::Guid.literal_list(guids)?;
    let types = if types.is_empty() {
        &[AddonType::Extension][..]
    } else {
        types
    };
    let type_list = types
        .iter()
        .map(|kind| kind.code().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let owners = SqlBuilder::from(Table::AddonsUsers)
        .select(["au.user_id"])
        .join(Table::Addons)?
        .and_where(format!("a.guid IN ({list})"))
        .group_by("au.user_id")
        .build();

    Ok(SqlBuilder::from(Table::AddonsUsers)
        .select(["a.guid"])
        .join(Table::Addons)?
        .and_where(format!("au.user_id IN ({owners})"))
        .and_where(format!(
            "a.guid NOT LIKE {}",
            quote_literal(&format!("{REUSED_GUID_PREFIX}%"))
        ))
        .and_where(format!("a.addontype_id IN ({type_list})"))
        .group_by("a.id")
        .build())
}
