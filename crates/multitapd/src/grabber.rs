use anyhow::{Context, Result};
use evdev::{AttributeSetRef, Device, InputEvent, Key};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const INPUT_DIR: &str = "/dev/input";

/// KEY_NUMERIC_0 and KEY_NUMERIC_1 from the phone-keypad block.
const KEY_NUMERIC_0: Key = Key::new(0x200);
const KEY_NUMERIC_1: Key = Key::new(0x201);

/// One raw evdev event, tagged with the index of the keypad it came from so
/// the main loop can pick that keypad's translator.
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    pub device_idx: usize,
    pub event: InputEvent,
}

/// Paths of every evdev node under /dev/input that can type keypad digits.
/// Nodes that cannot be opened (usually permissions) are skipped.
pub fn find_keypads() -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(INPUT_DIR)
        .with_context(|| format!("listing {}", INPUT_DIR))?;

    let mut keypads = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !is_event_node(&path) {
            continue;
        }
        let dev = match Device::open(&path) {
            Ok(dev) => dev,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot open input node");
                continue;
            }
        };
        if dev.supported_keys().is_some_and(has_digit_keys) {
            info!(path = %path.display(), name = ?dev.name(), "keypad detected");
            keypads.push(path);
        }
    }
    keypads.sort();
    Ok(keypads)
}

/// `eventN` nodes carry key events; `mouseN`, `jsN` and `by-id` links do not.
fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("event"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// A full digit row, a numeric keypad, or the phone-style numeric keys.
fn has_digit_keys(keys: &AttributeSetRef<Key>) -> bool {
    let both = |a: Key, b: Key| keys.contains(a) && keys.contains(b);
    both(Key::KEY_1, Key::KEY_0)
        || both(Key::KEY_KP1, Key::KEY_KP0)
        || both(KEY_NUMERIC_1, KEY_NUMERIC_0)
}

/// Stream a keypad's events into the main loop. The keypad stays shared
/// with the rest of the desktop; nothing is grabbed or re-emitted.
/// Returns when the main loop is gone or the keypad disappears.
pub async fn read_device(
    path: PathBuf,
    device_idx: usize,
    tx: mpsc::UnboundedSender<DeviceEvent>,
) -> Result<()> {
    let dev = Device::open(&path)
        .with_context(|| format!("opening keypad {}", path.display()))?;
    let keypad = dev.name().unwrap_or("unnamed keypad").to_string();
    let mut events = dev
        .into_event_stream()
        .with_context(|| format!("reading keypad {}", path.display()))?;
    info!(keypad = %keypad, idx = device_idx, "listening for keypad input");

    let mut forwarded: u64 = 0;
    let reason = loop {
        let event = match events.next_event().await {
            Ok(event) => event,
            Err(e) => break format!("read failed: {}", e),
        };
        if tx.send(DeviceEvent { device_idx, event }).is_err() {
            break "main loop stopped".to_string();
        }
        forwarded += 1;
    };

    warn!(keypad = %keypad, idx = device_idx, forwarded, %reason, "keypad input ended");
    Ok(())
}
