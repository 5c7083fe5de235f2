//! Utility modules for the encoding engine.

mod ffmpeg_parser;
mod playlist;
mod records;

pub use ffmpeg_parser::{
    is_error_line, parse_bitrate_kbps, parse_progress, parse_speed, parse_time, parse_time_field,
};
pub use playlist::{concat_line, write_concat_playlist};
pub use records::RecordReader;
