//! Names shared across the store, the pipeline and the CLI.

pub const APP_NAME: &str = "hotpatch";

/// Canonical bundle file inside every version directory.
pub const BUNDLE_FILENAME: &str = "index.bundlejs";

/// Binary diff payload shipped inside patch archives.
pub const PATCH_FILENAME: &str = "index.bundlejs.patch";

/// Copy/delete manifest shipped inside patch archives.
pub const DIFF_MANIFEST_FILENAME: &str = "__diff.json";

/// Directory under the store root holding the persisted state documents.
pub const STATE_DIR: &str = ".state";

/// Lock file under the store root.
pub const LOCK_FILENAME: &str = ".lock";

pub const FULL_SUFFIX: &str = ".ppk";
pub const PACKAGE_PATCH_SUFFIX: &str = ".apk.patch";
pub const BUNDLE_PATCH_SUFFIX: &str = ".ppk.patch";

/// Suffix of the directory a version is assembled in before promotion.
pub const STAGING_SUFFIX: &str = ".tmp";
