use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Reserved words the lexer reports as keywords
static RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // divisions and sections
        "IDENTIFICATION", "ID", "ENVIRONMENT", "DATA", "PROCEDURE", "DIVISION", "SECTION",
        "PROGRAM-ID", "AUTHOR", "INSTALLATION", "DATE-WRITTEN", "DATE-COMPILED", "SECURITY",
        "CONFIGURATION", "SOURCE-COMPUTER", "OBJECT-COMPUTER", "SPECIAL-NAMES",
        "INPUT-OUTPUT", "FILE-CONTROL", "I-O-CONTROL", "FILE", "WORKING-STORAGE",
        "LOCAL-STORAGE", "LINKAGE", "SCREEN", "REPORT", "COMMUNICATION", "DECLARATIVES",
        // data description
        "FD", "SD", "RD", "PIC", "PICTURE", "VALUE", "VALUES", "OCCURS", "TIMES", "DEPENDING",
        "INDEXED", "REDEFINES", "RENAMES", "USAGE", "DISPLAY", "COMP", "COMP-1", "COMP-2",
        "COMP-3", "COMP-4", "COMP-5", "COMPUTATIONAL", "COMPUTATIONAL-1", "COMPUTATIONAL-2",
        "COMPUTATIONAL-3", "COMPUTATIONAL-4", "COMPUTATIONAL-5", "BINARY", "PACKED-DECIMAL",
        "INDEX", "POINTER", "FILLER", "JUSTIFIED", "JUST", "SYNCHRONIZED", "SYNC", "BLANK",
        "SIGN", "LEADING", "TRAILING", "SEPARATE", "CHARACTER", "EXTERNAL", "GLOBAL",
        "ASCENDING", "DESCENDING", "KEY", "RECORD", "RECORDS", "LABEL", "STANDARD", "OMITTED",
        "BLOCK", "CONTAINS", "CHARACTERS", "RECORDING", "MODE",
        // file control
        "SELECT", "ASSIGN", "ORGANIZATION", "SEQUENTIAL", "RELATIVE", "INDEXED", "ACCESS",
        "RANDOM", "DYNAMIC", "STATUS", "ALTERNATE", "OPTIONAL", "LINE",
        // verbs
        "ACCEPT", "ADD", "ALTER", "CALL", "CANCEL", "CLOSE", "COMPUTE", "CONTINUE", "DELETE",
        "DIVIDE", "ENTRY", "EVALUATE", "EXIT", "GO", "GOBACK", "IF", "INITIALIZE",
        "INSPECT", "MERGE", "MOVE", "MULTIPLY", "OPEN", "PERFORM", "READ", "RELEASE", "RETURN",
        "REWRITE", "SEARCH", "SET", "SORT", "START", "STOP", "STRING", "SUBTRACT", "UNSTRING",
        "WRITE", "EXEC", "END-EXEC", "USE",
        // phrases
        "TO", "FROM", "INTO", "GIVING", "BY", "OF", "IN", "IS", "ARE", "THRU", "THROUGH",
        "UNTIL", "VARYING", "AFTER", "BEFORE", "WITH", "TEST", "USING", "RETURNING",
        "REFERENCE", "CONTENT", "ON", "OVERFLOW", "EXCEPTION", "SIZE", "ERROR", "INVALID",
        "AT", "END", "NOT", "AND", "OR", "THEN", "ELSE", "WHEN", "OTHER", "ALSO", "TRUE",
        "FALSE", "REMAINDER", "ROUNDED", "CORRESPONDING", "CORR", "REPLACING", "TALLYING",
        "CONVERTING", "DELIMITED", "COUNT", "POINTER", "INITIAL", "ALL", "FOR", "INPUT",
        "OUTPUT", "I-O", "EXTEND", "RUN", "PROGRAM", "UPON", "ADVANCING", "PAGE", "LINES",
        "NEXT", "SENTENCE", "GREATER", "LESS", "EQUAL", "THAN", "NUMERIC", "ALPHABETIC",
        "POSITIVE", "NEGATIVE", "UP", "DOWN", "DATE", "DAY", "DAY-OF-WEEK", "TIME",
        "FUNCTION", "ADDRESS", "LENGTH", "COPY", "REPLACE", "SUPPRESS", "PROCEED",
        // scope terminators
        "END-IF", "END-EVALUATE", "END-PERFORM", "END-READ", "END-WRITE", "END-REWRITE",
        "END-DELETE", "END-START", "END-RETURN", "END-SEARCH", "END-CALL", "END-COMPUTE",
        "END-ADD", "END-SUBTRACT", "END-MULTIPLY", "END-DIVIDE", "END-STRING",
        "END-UNSTRING", "END-ACCEPT", "END-DISPLAY",
        // figurative constants
        "ZERO", "ZEROS", "ZEROES", "SPACE", "SPACES", "HIGH-VALUE", "HIGH-VALUES",
        "LOW-VALUE", "LOW-VALUES", "QUOTE", "QUOTES", "NULL", "NULLS",
    ]
    .into_iter()
    .collect()
});

/// Words that begin a statement in the procedure division
static VERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ACCEPT", "ADD", "ALTER", "CALL", "CANCEL", "CLOSE", "COMPUTE", "CONTINUE", "DELETE",
        "DISPLAY", "DIVIDE", "ENTRY", "EVALUATE", "EXIT", "GO", "GOBACK", "IF", "INITIALIZE",
        "INSPECT", "MERGE", "MOVE", "MULTIPLY", "OPEN", "PERFORM", "READ", "RELEASE", "RETURN",
        "REWRITE", "SEARCH", "SET", "SORT", "START", "STOP", "STRING", "SUBTRACT", "UNSTRING",
        "WRITE", "WHEN", "EXEC", "USE",
    ]
    .into_iter()
    .collect()
});

#[must_use]
pub fn is_reserved(word: &str) -> bool {
    RESERVED.contains(word.to_ascii_uppercase().as_str())
}

#[must_use]
pub fn is_verb(word: &str) -> bool {
    VERBS.contains(word.to_ascii_uppercase().as_str())
}

/// Figurative constants read as literals rather than data names
#[must_use]
pub fn is_figurative(word: &str) -> bool {
    matches!(
        word.to_ascii_uppercase().as_str(),
        "ZERO" | "ZEROS" | "ZEROES" | "SPACE" | "SPACES" | "HIGH-VALUE" | "HIGH-VALUES"
            | "LOW-VALUE" | "LOW-VALUES" | "QUOTE" | "QUOTES" | "NULL" | "NULLS" | "ALL"
    )
}
