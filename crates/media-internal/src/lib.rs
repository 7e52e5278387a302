//! Parsing helpers shared between media-sdp's attribute parsers.

mod ws;

pub type IResult<I, O> = nom::IResult<I, O, nom::error::VerboseError<I>>;
pub use nom::Finish;
pub use ws::ws;
