//! CLI Exit Code Registry
//!
//! Single source of truth for all CLI exit codes. Scripts and CI jobs rely
//! on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success / dataset matches                        |
//! | 1    | Dataset does not match the database              |
//! | 2    | Usage error (bad args)                           |
//! | 3    | IO error (missing file, unwritable output)       |
//! | 4    | Invalid config file                              |
//! | 5    | Malformed golden dataset                         |
//! | 6    | Database error (cannot open, unknown table)      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant with the next free value
//! 2. Document what triggers it
//! 3. Update the table above

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Dataset differs from the database.
/// Like `diff(1)`, exit 1 means "inputs differ."
pub const EXIT_MISMATCH: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// File could not be read or written.
pub const EXIT_IO: u8 = 3;

/// snapfix.toml failed to parse or validate.
pub const EXIT_CONFIG: u8 = 4;

/// Golden dataset is malformed.
pub const EXIT_DATASET_MALFORMED: u8 = 5;

/// SQLite error: cannot open the file, unknown table, etc.
pub const EXIT_DATABASE: u8 = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_MISMATCH,
            EXIT_USAGE,
            EXIT_IO,
            EXIT_CONFIG,
            EXIT_DATASET_MALFORMED,
            EXIT_DATABASE,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
