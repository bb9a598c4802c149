//! Code → label tables for decoded columns.

pub const ELECTION_TYPES: &[(&str, &str)] = &[
    ("G", "General"),
    ("P", "Primary"),
    ("R", "Runoff"),
    ("C", "Convention"),
    ("E", "Recount"),
    ("O", "Other"),
    ("SG", "Special General"),
    ("SP", "Special Primary"),
    ("SR", "Special Runoff"),
    ("SC", "Special Convention"),
    ("PR", "Primary Runoff"),
    ("GR", "General Runoff"),
    ("CAU", "Caucus"),
    ("CON", "Convention"),
    ("ConvG", "General Convention"),
    ("ConvP", "Primary Convention"),
];
