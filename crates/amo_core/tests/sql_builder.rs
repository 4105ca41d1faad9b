use amo_core::{
    all_ids_query, involved_accounts_query, map_ids_query, quote_literal, users_for_ids_query,
    AddonColumn, AddonType, SqlBuilder, SqlError, Table,
};
use pretty_assertions::assert_eq;

#[test]
fn files_query_joins_addons_through_versions() {
    let sql = SqlBuilder::from(Table::Files)
        .select(["f.id", "a.guid"])
        .join(Table::Addons)
        .unwrap()
        .and_where("f.status = 4")
        .and_where("a.addontype_id = 1")
        .order_by("f.id")
        .build();
    assert_eq!(
        sql,
        "SELECT f.id, a.guid\n\
         FROM files f\n\
         LEFT JOIN versions v ON (v.id = f.version_id)\n\
         LEFT JOIN addons a ON (a.id = v.addon_id)\n\
         WHERE f.status = 4\n  AND a.addontype_id = 1\n\
         ORDER BY f.id"
    );
}

#[test]
fn joining_a_present_table_adds_nothing() {
    let once = SqlBuilder::from(Table::Files).join(Table::Versions).unwrap();
    let twice = once.clone().join(Table::Versions).unwrap().join(Table::Files).unwrap();
    assert_eq!(once, twice);
    assert_eq!(
        twice.build(),
        "SELECT *\nFROM files f\nLEFT JOIN versions v ON (v.id = f.version_id)"
    );
}

#[test]
fn unreachable_table_is_rejected() {
    let err = SqlBuilder::from(Table::Files).join(Table::Users).unwrap_err();
    assert_eq!(err, SqlError::NoJoinPath { to: Table::Users });
    assert_eq!(err.to_string(), "no known relation joins users to the query");
}

#[test]
fn literals_are_quoted_and_escaped() {
    assert_eq!(quote_literal("a@b"), "'a@b'");
    assert_eq!(quote_literal("x') OR 1=1 --"), "'x'') OR 1=1 --'");
    assert_eq!(quote_literal(r"back\slash"), r"'back\\slash'");
}

#[test]
fn numeric_column_rejects_text() {
    let err = map_ids_query(AddonColumn::Id, AddonColumn::Guid, &["12", "1; DROP TABLE addons"])
        .unwrap_err();
    assert_eq!(
        err,
        SqlError::NonNumericId {
            column: "id",
            value: "1; DROP TABLE addons".to_string()
        }
    );
}

#[test]
fn empty_id_list_is_an_error() {
    let none: [&str; 0] = [];
    assert_eq!(
        users_for_ids_query(AddonColumn::Guid, &none),
        Err(SqlError::EmptyIdList)
    );
}

#[test]
fn map_ids_selects_both_columns() {
    let sql = map_ids_query(AddonColumn::Guid, AddonColumn::Id, &["a@b", "c@d"]).unwrap();
    assert_eq!(
        sql,
        "SELECT a.guid, a.id\nFROM addons a\nWHERE a.guid IN ('a@b', 'c@d')"
    );
    let sql = map_ids_query(AddonColumn::Id, AddonColumn::Slug, &[" 7 ", "8"]).unwrap();
    assert_eq!(sql, "SELECT a.id, a.slug\nFROM addons a\nWHERE a.id IN (7, 8)");
}

#[test]
fn all_ids_skips_nulls() {
    assert_eq!(
        all_ids_query(AddonColumn::Guid),
        "SELECT a.guid\nFROM addons a\nWHERE a.guid IS NOT NULL"
    );
}

#[test]
fn users_for_ids_joins_accounts() {
    let sql = users_for_ids_query(AddonColumn::Slug, &["my-addon"]).unwrap();
    assert_eq!(
        sql,
        "SELECT au.user_id, u.display_name, u.username\n\
         FROM addons_users au\n\
         LEFT JOIN addons a ON (a.id = au.addon_id)\n\
         LEFT JOIN users u ON (u.id = au.user_id)\n\
         WHERE a.slug IN ('my-addon')\n\
         GROUP BY au.user_id"
    );
}

#[test]
fn involved_accounts_nests_owner_lookup() {
    let sql = involved_accounts_query(&["a@b"], &[AddonType::Extension, AddonType::StaticTheme])
        .unwrap();
    assert_eq!(
        sql,
        "SELECT a.guid\n\
         FROM addons_users au\n\
         LEFT JOIN addons a ON (a.id = au.addon_id)\n\
         WHERE au.user_id IN (SELECT au.user_id\n\
         FROM addons_users au\n\
         LEFT JOIN addons a ON (a.id = au.addon_id)\n\
         WHERE a.guid IN ('a@b')\n\
         GROUP BY au.user_id)\n  \
         AND a.guid NOT LIKE 'guid-reused-by-pk-%'\n  \
         AND a.addontype_id IN (1, 10)\n\
         GROUP BY a.id"
    );
}

#[test]
fn involved_accounts_defaults_to_extensions() {
    let sql = involved_accounts_query(&["a@b"], &[]).unwrap();
    assert!(sql.contains("AND a.addontype_id IN (1)\n"));
}

#[test]
fn addon_names_parse() {
    assert_eq!("GUID".parse::<AddonColumn>(), Ok(AddonColumn::Guid));
    assert_eq!("lwtheme".parse::<AddonType>(), Ok(AddonType::LightweightTheme));
    assert_eq!(AddonType::LightweightTheme.code(), 9);
    let err = "widget".parse::<AddonType>().unwrap_err();
    assert_eq!(err.to_string(), "unknown add-on type \"widget\"");
}
