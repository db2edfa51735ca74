//! Staging table DDL derived from the live table's `SHOW CREATE TABLE`.
//!
//! The live and archive databases can sit on different hosts, so `CREATE TABLE ... LIKE` is not
//! an option. Instead the live definition is rewritten:
//! - the table name becomes `` `<db>_archive`.`<table>_archive` ``
//! - foreign key constraints are dropped (their parents do not exist in the archive database)
//! - the `AUTO_INCREMENT=` seed is dropped

use crate::error::{DbError, Result};
use crate::sql_guard::qualified;

/// Rewrite a `SHOW CREATE TABLE` statement into the staging table definition.
pub fn staging_ddl(
    show_create: &str,
    archive_database: &str,
    archive_table: &str,
) -> Result<String> {
    let lines: Vec<&str> = show_create.lines().collect();
    let header = lines
        .first()
        .ok_or_else(|| DbError::invalid_state("empty CREATE TABLE statement"))?;
    let is_table = header.trim_start().to_ascii_uppercase().starts_with("CREATE TABLE");
    if !is_table || !header.trim_end().ends_with('(') {
        return Err(DbError::invalid_state(format!(
            "unexpected CREATE TABLE header: {}",
            header
        )));
    }
    let closing_idx = lines
        .iter()
        .rposition(|line| line.trim_start().starts_with(')'))
        .filter(|idx| *idx > 0)
        .ok_or_else(|| DbError::invalid_state("CREATE TABLE statement has no closing ')'"))?;

    let mut definitions: Vec<String> = lines[1..closing_idx]
        .iter()
        .filter(|line| !is_foreign_key(line))
        .map(|line| line.trim_end().trim_end_matches(',').to_string())
        .collect();
    if definitions.is_empty() {
        return Err(DbError::invalid_state("CREATE TABLE statement has no columns"));
    }
    let last = definitions.len() - 1;
    for def in definitions.iter_mut().take(last) {
        def.push(',');
    }

    let options = strip_auto_increment(lines[closing_idx].trim());

    let mut ddl = format!(
        "CREATE TABLE {} (\n",
        qualified(archive_database, archive_table)
    );
    ddl.push_str(&definitions.join("\n"));
    ddl.push('\n');
    ddl.push_str(&options);
    Ok(ddl)
}

fn is_foreign_key(line: &str) -> bool {
    let upper = line.trim_start().to_ascii_uppercase();
    (upper.starts_with("CONSTRAINT") || upper.starts_with("FOREIGN KEY"))
        && upper.contains("FOREIGN KEY")
}

fn strip_auto_increment(options: &str) -> String {
    options
        .split(' ')
        .filter(|part| !part.to_ascii_uppercase().starts_with("AUTO_INCREMENT="))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: &str = "CREATE TABLE `orders` (\n  `id` bigint NOT NULL AUTO_INCREMENT,\n  `customer_id` bigint NOT NULL,\n  `created_at` datetime NOT NULL,\n  PRIMARY KEY (`id`),\n  KEY `idx_created` (`created_at`),\n  CONSTRAINT `fk_customer` FOREIGN KEY (`customer_id`) REFERENCES `customers` (`id`)\n) ENGINE=InnoDB AUTO_INCREMENT=4821 DEFAULT CHARSET=utf8mb4";

    #[test]
    fn test_rewrites_name_and_strips_foreign_keys() {
        let ddl = staging_ddl(ORDERS, "shop_archive", "orders_archive").unwrap();
        assert!(ddl.starts_with("CREATE TABLE `shop_archive`.`orders_archive` (\n"));
        assert!(!ddl.contains("FOREIGN KEY"));
        assert!(!ddl.contains("AUTO_INCREMENT=4821"));
        // column-level AUTO_INCREMENT is kept
        assert!(ddl.contains("`id` bigint NOT NULL AUTO_INCREMENT,"));
        assert!(ddl.ends_with(
            "  KEY `idx_created` (`created_at`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        ));
    }

    #[test]
    fn test_keeps_table_without_foreign_keys() {
        let show = "CREATE TABLE `events` (\n  `id` int NOT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB";
        let ddl = staging_ddl(show, "app_archive", "events_archive").unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE `app_archive`.`events_archive` (\n  `id` int NOT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB"
        );
    }

    #[test]
    fn test_rejects_non_table_statement() {
        let show = "CREATE ALGORITHM=UNDEFINED VIEW `v` AS select 1";
        assert!(staging_ddl(show, "a", "b").is_err());
        assert!(staging_ddl("", "a", "b").is_err());
    }
}
