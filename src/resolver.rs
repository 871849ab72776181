/// Dictionary schema version shipped with this build. Bump to roll out a new dictionary.
pub const CURRENT_VERSION: u32 = 2;

/// Versioned asset location of the rhyme dictionary.
///
/// The path segment and the `v` query parameter always carry the same version,
/// so older assets stay fetchable by passing their version explicitly.
/// A trailing `/` on the origin is dropped so the path never starts with `//`.
pub fn build_db_url(base_origin: &str, version: u32) -> String {
    let origin = base_origin.trim_end_matches('/');
    format!("{origin}/rhyme-db/rhyme-db.v{version}.json?v={version}")
}
