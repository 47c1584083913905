use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pingpair-dyn",
    about = "Dynamic-payload ping pair link tester for half-duplex links"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Run one node over a half-duplex serial link (RTS = driver enable, CTS = role strap)
    Serial(SerialOpts),
    /// Run a ping node and a pong node in-process over a simulated air channel
    Sim(SimOpts),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChoice {
    /// Read the role strap (CTS high = ping, low = pong)
    Auto,
    Ping,
    Pong,
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Serial device path
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub dev: String,
    /// Baud rate
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
    /// Node role
    #[arg(long, value_enum, default_value_t = RoleChoice::Auto)]
    pub role: RoleChoice,
    /// Strap settle time before sampling, in milliseconds (default 20)
    #[arg(long)]
    pub settle_ms: Option<u64>,
    /// Stop after N ticks (pings sent, or echoes for pong); runs forever if omitted
    #[arg(long)]
    pub ticks: Option<u64>,
    /// Stats print interval in seconds (0 disables)
    #[arg(long, default_value_t = 10.0)]
    pub stats: f64,
}

#[derive(Args, Debug, Clone)]
pub struct SimOpts {
    /// Number of ping ticks (58 = two full laps of payload sizes)
    #[arg(long, default_value_t = 58)]
    pub ticks: u64,
    /// Drop every Nth transmission attempt on the air
    #[arg(long)]
    pub drop_every: Option<u32>,
    /// Corrupt every Nth transmission attempt on the air
    #[arg(long)]
    pub corrupt_every: Option<u32>,
    /// One-way air latency in milliseconds
    #[arg(long, default_value_t = 2)]
    pub latency_ms: u64,
    /// Stats print interval in seconds (0 disables)
    #[arg(long, default_value_t = 2.0)]
    pub stats: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_defaults() {
        let cli = Cli::try_parse_from(["pingpair-dyn", "serial"]).unwrap();
        let Cmd::Serial(opts) = cli.cmd else {
            panic!("expected serial");
        };
        assert_eq!(opts.dev, "/dev/ttyUSB0");
        assert_eq!(opts.role, RoleChoice::Auto);
        assert_eq!(opts.ticks, None);
    }

    #[test]
    fn forced_role_and_faults() {
        let cli = Cli::try_parse_from(["pingpair-dyn", "serial", "--role", "pong"]).unwrap();
        assert!(matches!(
            cli.cmd,
            Cmd::Serial(SerialOpts {
                role: RoleChoice::Pong,
                ..
            })
        ));

        let cli = Cli::try_parse_from([
            "pingpair-dyn",
            "sim",
            "--ticks",
            "3",
            "--corrupt-every",
            "4",
        ])
        .unwrap();
        let Cmd::Sim(opts) = cli.cmd else {
            panic!("expected sim");
        };
        assert_eq!(opts.ticks, 3);
        assert_eq!(opts.corrupt_every, Some(4));
        assert_eq!(opts.drop_every, None);
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(Cli::try_parse_from(["pingpair-dyn", "serial", "--role", "relay"]).is_err());
    }
}
