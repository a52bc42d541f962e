//! Human-readable labels for the enumerated packet fields.
//!
//! Codes missing from a table never fail decoding; they map to [`UNKNOWN`]
//! so newer handheld firmware keeps flowing through older stations.

use crate::types::ProtocolVersion;

pub const UNKNOWN: &str = "UNKNOWN";

const STATUS_V1: &[(u8, &str)] = &[
    (1, "EMERGENCY / CRITICAL"),
    (2, "SAFE / OK"),
    (3, "NEED FOOD / WATER / MEDICAL SUPPLIES"),
];

const STATUS_V2: &[(u8, &str)] = &[(1, "ALERT"), (2, "SAFE"), (3, "AID")];

const PACKET_TYPE: &[(u8, &str)] = &[(1, "STATUS"), (2, "RESPONSE")];

const RESPONSE: &[(u8, &str)] = &[(0, "NOT RECEIVED"), (1, "RECEIVED")];

fn lookup(table: &'static [(u8, &'static str)], code: u8) -> &'static str {
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN)
}

pub fn status_label(version: ProtocolVersion, code: u8) -> &'static str {
    match version {
        ProtocolVersion::V1 => lookup(STATUS_V1, code),
        ProtocolVersion::V2 => lookup(STATUS_V2, code),
    }
}

pub fn packet_type_label(code: u8) -> &'static str {
    lookup(PACKET_TYPE, code)
}

pub fn response_label(code: u8) -> &'static str {
    lookup(RESPONSE, code)
}
