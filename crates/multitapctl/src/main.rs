use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use multitap_core::config;
use multitap_core::ipc::{self, ClientMsg, DaemonMsg};
use multitap_core::keypad::{Key, BACKSPACE_LABEL};
use std::io::{BufRead, BufReader, Lines, Write};
use std::os::unix::net::UnixStream;

#[derive(Parser)]
#[command(name = "multitapctl", about = "Drive and inspect the multitapd typing session")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show daemon status
    Status,
    /// Print the composed text once
    Show {
        /// Print the full typing state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the composed text after every change
    Watch {
        /// Also print which keypad key is held
        #[arg(long)]
        highlight: bool,
    },
    /// Press keypad keys in order
    Press {
        /// Key labels (0-9, * or #)
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Drop the pending character, or delete the last committed one
    Backspace,
}

struct Connection {
    writer: UnixStream,
    lines: Lines<BufReader<UnixStream>>,
}

impl Connection {
    fn open() -> Result<Self> {
        let socket_path = config::socket_path();
        let stream = UnixStream::connect(&socket_path).with_context(|| {
            format!("connecting to multitapd at {}\nIs the daemon running?", socket_path.display())
        })?;
        let writer = stream.try_clone().context("cloning stream")?;
        Ok(Self {
            writer,
            lines: BufReader::new(stream).lines(),
        })
    }

    fn send(&mut self, msg: &ClientMsg) -> Result<()> {
        self.writer
            .write_all(ipc::encode(msg).as_bytes())
            .context("sending command")
    }

    /// Next decodable message from the daemon.
    fn recv(&mut self) -> Result<DaemonMsg> {
        for line in self.lines.by_ref() {
            let line = line.context("reading response")?;
            if let Some(msg) = ipc::decode_daemon(&line) {
                return Ok(msg);
            }
        }
        bail!("daemon closed the connection")
    }

    fn expect_ack(&mut self) -> Result<()> {
        match self.recv()? {
            DaemonMsg::Ack { ok: true, .. } => Ok(()),
            DaemonMsg::Ack { ok: false, message } => bail!("{}", message),
            other => bail!("unexpected response: {:?}", other),
        }
    }

    fn tap(&mut self, label: &str) -> Result<()> {
        self.send(&ClientMsg::KeyDown { label: label.to_string() })?;
        self.expect_ack()?;
        self.send(&ClientMsg::KeyUp { label: label.to_string() })?;
        self.expect_ack()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reject bad labels before touching the daemon, which would ignore them.
    if let Command::Press { keys } = &cli.command {
        for label in keys {
            label.parse::<Key>()?;
        }
    }

    let mut conn = Connection::open()?;

    match cli.command {
        Command::Status => {
            conn.send(&ClientMsg::GetStatus)?;
            if let DaemonMsg::Status { version, debounce_ms, devices, watchers } = conn.recv()? {
                println!("multitapd v{}", version);
                println!("  debounce: {} ms", debounce_ms);
                println!("  devices:  {}", devices);
                println!("  watchers: {}", watchers);
            }
        }
        Command::Show { json } => {
            conn.send(&ClientMsg::GetState)?;
            if let DaemonMsg::State { state, rendered } = conn.recv()? {
                if json {
                    println!("{}", serde_json::to_string_pretty(&state).context("encoding state")?);
                } else {
                    println!("{}", rendered);
                }
            }
        }
        Command::Watch { highlight } => {
            conn.send(&ClientMsg::Watch)?;
            loop {
                match conn.recv()? {
                    DaemonMsg::State { rendered, .. } => println!("{}", rendered),
                    DaemonMsg::Highlight { key } if highlight => match key {
                        Some(key) => println!("[{}]", key),
                        None => println!("[ ]"),
                    },
                    _ => {}
                }
            }
        }
        Command::Press { keys } => {
            for label in &keys {
                conn.tap(label)?;
            }
        }
        Command::Backspace => conn.tap(BACKSPACE_LABEL)?,
    }

    Ok(())
}
