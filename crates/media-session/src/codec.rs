/// One statically- or dynamically-numbered audio codec this crate can
/// negotiate, identified by encoding name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    pub name: &'static str,
    pub static_pt: Option<u8>,
    pub clock_rate: u32,
    pub channels: Option<u32>,
}

pub const PCMU: Codec = Codec {
    name: "PCMU",
    static_pt: Some(0),
    clock_rate: 8000,
    channels: None,
};
pub const PCMA: Codec = Codec {
    name: "PCMA",
    static_pt: Some(8),
    clock_rate: 8000,
    channels: None,
};
pub const G722: Codec = Codec {
    name: "G722",
    static_pt: Some(9),
    clock_rate: 8000,
    channels: None,
};
pub const G729: Codec = Codec {
    name: "G729",
    static_pt: Some(18),
    clock_rate: 8000,
    channels: None,
};

pub const STATIC_CODECS: &[Codec] = &[PCMU, PCMA, G722, G729];

pub fn by_name(name: &str) -> Option<Codec> {
    STATIC_CODECS
        .iter()
        .copied()
        .find(|c| c.name.eq_ignore_ascii_case(name))
}

pub fn by_payload_type(pt: u8) -> Option<Codec> {
    STATIC_CODECS.iter().copied().find(|c| c.static_pt == Some(pt))
}
