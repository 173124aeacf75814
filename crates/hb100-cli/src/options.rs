//! Command-line options.

use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

/// Editor/controller for the HB100 guitar multi-effects unit.
#[derive(Parser, Debug)]
#[command(name = "hb100-edit", version, about, long_about = None)]
pub struct Options {
    /// Provide a CLI to interact with the device (default=no, quit when done)
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Expose an HTTP/WebSocket API on the provided port (0 disables)
    #[arg(short = 'H', long = "http-ws", value_name = "port", default_value_t = 0,
          allow_negative_numbers = true)]
    pub http_ws: i32,

    /// Don't connect to the device via USB
    #[arg(short = 'o', long)]
    pub offline: bool,

    /// Don't send the initialization messages at startup
    #[arg(short = 'I', long)]
    pub no_init: bool,

    /// Don't retrieve all presets at startup
    #[arg(short = 'G', long)]
    pub no_get_presets: bool,

    /// Don't retrieve extras (IRs?) at startup
    #[arg(short = 'E', long)]
    pub no_get_extras: bool,

    /// Folder to store all retrieved presets to (default=don't save presets)
    #[arg(short = 's', long = "save-presets", value_name = "path")]
    pub save_presets: Option<PathBuf>,

    /// Change the current preset at startup (0 means no)
    #[arg(short = 'c', long = "change-preset", value_name = "1-200", default_value_t = 0)]
    pub change_preset: u16,

    /// Binary preset file to read at startup
    #[arg(short = 'b', long = "preset-in", value_name = "path")]
    pub preset_in: Option<PathBuf>,

    /// Binary preset file to write at startup
    #[arg(short = 'B', long = "preset-out", value_name = "path")]
    pub preset_out: Option<PathBuf>,

    /// PHB preset file to read at startup
    #[arg(short = 'p', long = "phb-in", value_name = "path")]
    pub phb_in: Option<PathBuf>,

    /// PHB preset file to write at startup
    #[arg(short = 'P', long = "phb-out", value_name = "path")]
    pub phb_out: Option<PathBuf>,

    /// Upload the imported preset to the specified preset number (0 means no)
    #[arg(short = 'u', long = "upload-preset", value_name = "1-200", default_value_t = 0)]
    pub upload_preset: u16,

    /// Debug/logging level (0=disable debugging, 7=maximum debug level)
    #[arg(short = 'd', long = "debug-level", value_name = "0-7", default_value_t = 4,
          value_parser = clap::value_parser!(u8).range(0..=7))]
    pub debug_level: u8,

    /// Enable debug/logging timestamps
    #[arg(short = 't', long = "debug-timestamps")]
    pub debug_timestamps: bool,

    /// Disable color in the logging
    #[arg(short = 'C', long = "disable-colors")]
    pub disable_colors: bool,

    /// Debug/logging level for libusb (0=disabled, 4=maximum)
    #[arg(short = 'D', long = "libusb-debug", value_name = "0-4", default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=4))]
    pub debug_libusb: u8,
}

impl Options {
    /// The HTTP/WebSocket port to serve, with out-of-range values warned
    /// about and treated as disabled.
    pub fn http_port(&self) -> u16 {
        match u16::try_from(self.http_ws) {
            Ok(port) => port,
            Err(_) => {
                warn!(port = self.http_ws, "invalid HTTP/WebSocket port, disabling the API");
                0
            }
        }
    }
}
