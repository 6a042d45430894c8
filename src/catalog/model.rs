//! Row structs for the catalog's entity graph (spec §3). Associations are
//! resolved by integer id at query time rather than held as object
//! references, avoiding the direct cycles a `File` would otherwise need
//! (it points at `Hash` twice and at `RelPath` once).

use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hash {
    pub id: i64,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPath {
    pub id: i64,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelPath {
    pub id: i64,
    pub path: String,
    pub root_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeDir {
    pub id: i64,
    pub regex: String,
    pub root_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataField {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct File {
    pub id: i64,
    pub name: String,
    pub rel_path_id: i64,
    pub hash_id: i64,
    pub original_hash_id: i64,
    pub size: u64,
    pub mtime: f64,
    pub date: Option<OffsetDateTime>,
    pub date_field_id: Option<i64>,
    pub symbolic_link: bool,
    pub deduped: bool,
    pub deleted: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct FileDate {
    pub id: i64,
    pub file_id: i64,
    pub field_id: i64,
    pub date: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPriority {
    pub id: i64,
    pub patha_id: i64,
    pub pathb_id: i64,
}
