use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xigrab", about = "Global XInput2 hotkey listener")]
pub struct Cli {
    /// X display to connect to (defaults to $DISPLAY)
    #[arg(long, global = true)]
    pub display: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Grab Ctrl+Shift+U and Ctrl+Shift+G on every master keyboard
    /// and wait until Ctrl+Shift+G is released
    Listen,

    /// List the master input devices reported by the X server
    Devices,
}
