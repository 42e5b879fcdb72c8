use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use metering_rs::logging::init_logger_with_default;
use metering_rs::util::parse_hex_lenient;
use metering_rs::{
    decode_mbus_frame, decode_sml_capture, log_info, log_warn, DecoderConfig, MBusTransport,
    ReadingLayout, SecondaryAddress, SerialConfig, SmlConfig, SmlReader, VariableDataDecoder,
    ZeroLengthData,
};

#[derive(Parser)]
#[command(name = "metering-cli")]
#[command(about = "Read M-Bus heat meters and SML electricity meters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// M-Bus request/response meters
    #[command(subcommand)]
    Mbus(MbusCommand),
    /// SML push meters
    #[command(subcommand)]
    Sml(SmlCommand),
}

#[derive(Subcommand)]
enum MbusCommand {
    /// Wake, select and read one meter
    Read(ReadArgs),
    /// Decode a captured long frame given as hex
    Decode {
        hex: String,
        /// Records with DIF length code 0 carry one data byte
        #[arg(long)]
        zero_length_byte: bool,
    },
}

#[derive(Args)]
struct ReadArgs {
    #[arg(short, long)]
    port: String,
    #[arg(short, long, default_value_t = 2400)]
    baud: u32,
    /// Number of 0x55 wake-up bytes
    #[arg(long, default_value_t = 504)]
    preamble: usize,
    /// Secondary address (identification number) to select
    #[arg(long)]
    serial: Option<String>,
    /// Skip SND_NKE and secondary selection
    #[arg(long)]
    no_probe: bool,
    #[arg(long, default_value = "0xFD", value_parser = parse_address)]
    address: u8,
    #[arg(long, default_value_t = 2)]
    retries: u32,
    #[arg(long)]
    dtr: bool,
    #[arg(long)]
    rts: bool,
    /// Hex dump every frame at debug level
    #[arg(long)]
    trace: bool,
}

#[derive(Subcommand)]
enum SmlCommand {
    /// Print every reading set received on the port
    Watch {
        #[arg(short, long)]
        port: String,
        #[arg(short, long, default_value_t = 9600)]
        baud: u32,
        #[arg(long)]
        trace: bool,
    },
    /// Decode a captured byte stream given as hex
    Decode { hex: String },
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger_with_default("info");

    let cli = Cli::parse();
    match cli.command {
        Commands::Mbus(MbusCommand::Read(args)) => read_mbus(args).await?,
        Commands::Mbus(MbusCommand::Decode {
            hex,
            zero_length_byte,
        }) => {
            let frame = parse_hex_lenient(&hex).context("frame is not valid hex")?;
            let zero_length = if zero_length_byte {
                ZeroLengthData::SingleByte
            } else {
                ZeroLengthData::Empty
            };
            let decoder = VariableDataDecoder::with_config(DecoderConfig { zero_length });
            let response = decode_mbus_frame(&frame, &decoder)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Sml(SmlCommand::Watch { port, baud, trace }) => {
            let config = SmlConfig {
                baudrate: baud,
                trace_frames: trace,
                ..SmlConfig::default()
            };
            let mut reader = SmlReader::open(&port, &config)
                .await
                .with_context(|| format!("cannot open {port}"))?;
            while let Some(result) = reader.next_reading().await {
                match result {
                    Ok(readings) => println!("{}", serde_json::to_string(&readings)?),
                    Err(e) if e.kind() == metering_rs::FailureKind::Io => return Err(e.into()),
                    Err(_) => {}
                }
            }
        }
        Commands::Sml(SmlCommand::Decode { hex }) => {
            let data = parse_hex_lenient(&hex).context("capture is not valid hex")?;
            let results = decode_sml_capture(&data, &SmlConfig::default(), &ReadingLayout::default());
            if results.is_empty() {
                log_warn("No complete SML message in capture");
            }
            for result in results {
                match result {
                    Ok(readings) => println!("{}", serde_json::to_string(&readings)?),
                    Err(e) => log_warn(&format!("SML message rejected: {e}")),
                }
            }
        }
    }

    Ok(())
}

async fn read_mbus(args: ReadArgs) -> Result<()> {
    let config = SerialConfig {
        baudrate: args.baud,
        preamble_len: args.preamble,
        max_retries: args.retries,
        dtr: args.dtr,
        rts: args.rts,
        trace_frames: args.trace,
        ..SerialConfig::default()
    };
    let mut transport = MBusTransport::open(&args.port, config)
        .await
        .with_context(|| format!("cannot open {}", args.port))?;

    if !args.no_probe {
        let address = match &args.serial {
            Some(serial) => SecondaryAddress::serial(serial),
            None => SecondaryAddress::wildcard(),
        };
        transport.probe(&address).await?;
    }

    let response = transport
        .read_meter(args.address, &VariableDataDecoder::default())
        .await
        .context("meter did not deliver a valid response")?;
    log_info(&format!(
        "Meter {} ({}, {}): {} readings, {} instant values",
        response.header.identification,
        response.header.manufacturer_code(),
        response.header.medium_name(),
        response.readings.len(),
        response.instants.len()
    ));
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
