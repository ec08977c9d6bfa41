//! Protocol tokens and commands that compression must leave untouched.
//!
//! Both tables are sorted, upper-case ASCII and searched with a binary
//! search on the upper-cased candidate.

/// Flag tokens and fixed replies that are part of the protocol syntax.
pub const KEYWORDS: &[&str] = &[
    "AFTER",
    "AGGREGATE",
    "ALPHA",
    "AND",
    "ASC",
    "ASYNC",
    "BEFORE",
    "BIT",
    "BY",
    "BYLEX",
    "BYSCORE",
    "BYTE",
    "CH",
    "COUNT",
    "DESC",
    "EX",
    "EXAT",
    "FIELDS",
    "FNX",
    "FXX",
    "GET",
    "GT",
    "IDX",
    "INCR",
    "KEEPTTL",
    "LEFT",
    "LEN",
    "LIMIT",
    "LT",
    "MATCH",
    "MAX",
    "MAXLEN",
    "MIN",
    "MINID",
    "MINMATCHLEN",
    "NOMKSTREAM",
    "NOT",
    "NX",
    "OK",
    "OR",
    "PONG",
    "PX",
    "PXAT",
    "QUEUED",
    "RANK",
    "REPLACE",
    "REV",
    "RIGHT",
    "STORE",
    "SUM",
    "SYNC",
    "TYPE",
    "WEIGHTS",
    "WITHMATCHLEN",
    "WITHSCORE",
    "WITHSCORES",
    "WITHVALUES",
    "XOR",
    "XX",
];

/// Commands whose arguments are script bodies, script hashes or JSON paths.
pub const COMPRESSION_DENYLIST: &[&str] = &[
    "EVAL",
    "EVALSHA",
    "EVALSHA_RO",
    "EVAL_RO",
    "FCALL",
    "FCALL_RO",
    "FUNCTION",
    "JSON.MERGE",
    "JSON.MSET",
    "JSON.SET",
    "SCRIPT",
];

const MAX_KEYWORD_LEN: usize = 12;

fn contains_folded(table: &[&str], candidate: &str) -> bool {
    let upper = candidate.to_ascii_uppercase();
    table.binary_search(&upper.as_str()).is_ok()
}

/// Case-insensitive membership test against [`KEYWORDS`].
pub fn is_keyword(candidate: &str) -> bool {
    candidate.len() <= MAX_KEYWORD_LEN && contains_folded(KEYWORDS, candidate)
}

/// Whether arguments of `command` may be compressed at all.
pub fn can_compress_command(command: &str) -> bool {
    !contains_folded(COMPRESSION_DENYLIST, command)
}
