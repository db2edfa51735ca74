//! Deterministic names for extract artifacts.
//!
//! A drain produces one local extract and one remote object. Both names are derived only from
//! the staging identity, the where clause that selected the rows, and the min/max of the log
//! column, so re-running a drain over the same rows yields the same object key.
//!
//! Layout:
//! ```text
//! local:  {archive_db}__{table}__{where}__{log_column}__{min}__{max}.tsv
//! remote: {live_db}/{table}/{table}__{where}__{log_column}__{min}__{max}.tsv
//! ```
//! The `{where}` segment is omitted for an empty where clause (recovered staging tables).

use crate::defaults::{COMPRESSED_SUFFIX, EXTRACT_EXTENSION};
use crate::types::{ColumnBounds, StagingTarget};

const SEGMENT_SEPARATOR: &str = "__";
const MAX_WHERE_SLUG_LEN: usize = 48;
const NULL_BOUND: &str = "null";

/// Local file name and remote object path for one drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveNames {
    pub local_file_name: String,
    pub remote_path: String,
}

impl ArchiveNames {
    pub fn compressed_local_file_name(&self) -> String {
        format!("{}{}", self.local_file_name, COMPRESSED_SUFFIX)
    }

    pub fn compressed_remote_path(&self) -> String {
        format!("{}{}", self.remote_path, COMPRESSED_SUFFIX)
    }

    /// Same names with `__{tag}` appended to the stem, for when the plain key is already taken.
    pub fn with_discriminator(&self, tag: &str) -> Self {
        let tag = sanitize_token(tag);
        Self {
            local_file_name: insert_before_extension(&self.local_file_name, &tag),
            remote_path: insert_before_extension(&self.remote_path, &tag),
        }
    }
}

fn insert_before_extension(name: &str, tag: &str) -> String {
    let extension = format!(".{}", EXTRACT_EXTENSION);
    let stem = name.strip_suffix(extension.as_str()).unwrap_or(name);
    format!("{}{}{}{}", stem, SEGMENT_SEPARATOR, tag, extension)
}

/// Compute the local file name and remote path for a staging table's contents.
pub fn compute_names(
    target: &StagingTarget,
    log_column: &str,
    bounds: Option<&ColumnBounds>,
    where_clause: &str,
) -> ArchiveNames {
    let (min, max) = match bounds {
        Some(b) => (bound_token(&b.min), bound_token(&b.max)),
        None => (NULL_BOUND.to_string(), NULL_BOUND.to_string()),
    };

    let mut segments = vec![sanitize_token(&target.table)];
    let descriptor = where_descriptor(where_clause);
    if !descriptor.is_empty() {
        segments.push(descriptor);
    }
    segments.push(sanitize_token(log_column));
    segments.push(min);
    segments.push(max);
    let stem = segments.join(SEGMENT_SEPARATOR);

    ArchiveNames {
        local_file_name: format!(
            "{}{}{}.{}",
            sanitize_token(&target.archive_database),
            SEGMENT_SEPARATOR,
            stem,
            EXTRACT_EXTENSION
        ),
        remote_path: format!(
            "{}/{}/{}.{}",
            sanitize_token(&target.live_database),
            sanitize_token(&target.table),
            stem,
            EXTRACT_EXTENSION
        ),
    }
}

/// Human-searchable, collision-resistant rendering of a where clause.
///
/// The slug keeps the clause's words and numbers; the 8-hex blake3 suffix separates clauses
/// that slug identically (`id > 1000` vs `id < 1000`). Blank clauses render as `""`.
pub fn where_descriptor(where_clause: &str) -> String {
    let trimmed = where_clause.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut slug = String::with_capacity(trimmed.len());
    let mut last_was_underscore = false;
    for ch in trimmed.chars() {
        if ch.is_ascii_alphanumeric() {
            last_was_underscore = false;
            slug.push(ch.to_ascii_lowercase());
        } else if !last_was_underscore {
            last_was_underscore = true;
            slug.push('_');
        }
    }
    let mut slug = slug.trim_matches('_').to_string();
    if slug.len() > MAX_WHERE_SLUG_LEN {
        slug.truncate(MAX_WHERE_SLUG_LEN);
        slug = slug.trim_end_matches('_').to_string();
    }
    let slug = if slug.is_empty() { "where" } else { slug.as_str() };

    let hash = blake3::hash(trimmed.as_bytes()).to_hex();
    format!("{}_{}", slug, &hash[..8])
}

fn bound_token(value: &str) -> String {
    let token = sanitize_token(value);
    if token.is_empty() {
        "empty".to_string()
    } else {
        token
    }
}

/// Keep `[A-Za-z0-9.-]`, map everything else to `_`.
fn sanitize_token(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> StagingTarget {
        StagingTarget::for_table("shop", "orders")
    }

    #[test]
    fn remote_path_embeds_where_descriptor_and_bounds() {
        let bounds = ColumnBounds::new("1001", "2000");
        let names = compute_names(&target(), "id", Some(&bounds), "id > 1000");

        let descriptor = where_descriptor("id > 1000");
        assert!(descriptor.starts_with("id_1000_"));
        assert!(names.remote_path.starts_with("shop/orders/"));
        assert!(names.remote_path.contains(&descriptor));
        assert!(names.remote_path.contains("1001"));
        assert!(names.remote_path.contains("2000"));
        assert!(names.remote_path.ends_with(".tsv"));
        assert!(names.local_file_name.starts_with("shop_archive__orders__"));
    }

    #[test]
    fn empty_where_omits_descriptor_segment() {
        let bounds = ColumnBounds::new("1", "9");
        let names = compute_names(&target(), "id", Some(&bounds), "");
        assert_eq!(names.remote_path, "shop/orders/orders__id__1__9.tsv");
        assert_eq!(names.local_file_name, "shop_archive__orders__id__1__9.tsv");
    }

    #[test]
    fn opposite_predicates_do_not_collide() {
        assert_ne!(where_descriptor("id > 1000"), where_descriptor("id < 1000"));
    }

    #[test]
    fn timestamp_bounds_are_filename_safe() {
        let bounds = ColumnBounds::new("2024-01-01 00:00:00", "2024-03-31 23:59:59");
        let names = compute_names(&target(), "created_at", Some(&bounds), "");
        assert!(names
            .remote_path
            .ends_with("created_at__2024-01-01_00_00_00__2024-03-31_23_59_59.tsv"));
        assert!(!names.local_file_name.contains(' '));
        assert!(!names.local_file_name.contains(':'));
    }

    #[test]
    fn missing_bounds_render_as_null() {
        let names = compute_names(&target(), "id", None, "");
        assert_eq!(names.remote_path, "shop/orders/orders__id__null__null.tsv");
    }

    #[test]
    fn compressed_names_append_gz() {
        let names = compute_names(&target(), "id", None, "");
        assert_eq!(
            names.compressed_remote_path(),
            "shop/orders/orders__id__null__null.tsv.gz"
        );
        assert!(names.compressed_local_file_name().ends_with(".tsv.gz"));
    }

    #[test]
    fn discriminator_lands_before_the_extension() {
        let bounds = ColumnBounds::new("2020-01-01", "2020-01-01");
        let names =
            compute_names(&target(), "day", Some(&bounds), "").with_discriminator("3fa0c1d2");
        assert_eq!(
            names.compressed_remote_path(),
            "shop/orders/orders__day__2020-01-01__2020-01-01__3fa0c1d2.tsv.gz"
        );
        assert_eq!(
            names.local_file_name,
            "shop_archive__orders__day__2020-01-01__2020-01-01__3fa0c1d2.tsv"
        );
    }

    #[test]
    fn long_where_clause_is_truncated() {
        let clause = "created_at < '2020-01-01' AND status IN ('cancelled', 'refunded', 'expired') AND region = 'eu-west'";
        let descriptor = where_descriptor(clause);
        // slug + '_' + 8 hex
        assert!(descriptor.len() <= MAX_WHERE_SLUG_LEN + 9);
        assert!(descriptor.starts_with("created_at_2020_01_01_and_status"));
    }
}
