//! Sensor pipeline demo
//!
//! Run with: cargo run --example sensor_pipeline [FRAMES]
//!
//! A fake depth plugin publishes "astra://sensor0" with one depth stream.
//! The host drives the plugin from the update task; a consumer connects to
//! the stream, awaits frames, and queries a parameter.
//!
//! Set RUST_LOG=sensekit=trace to see catalog and bin lifecycle events.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sensekit::buffer::{BinWriter, ParameterBinPool};
use sensekit::service::{HostEvent, LogSeverity, PluginService, ServiceConfig, ServiceHost};
use sensekit::stream::{StreamCallbacks, StreamDescription, StreamType};
use sensekit::{BinHandle, ConnectionHandle, Error, ParameterBinHandle};

const WIDTH: usize = 160;
const HEIGHT: usize = 120;
const PARAM_RESOLUTION: u32 = 1;

/// Depth source producing a moving ramp
struct FakeDepth {
    writer: Arc<Mutex<Option<BinWriter>>>,
    frame_index: u64,
}

impl StreamCallbacks for FakeDepth {
    fn open(&mut self) -> sensekit::Result<()> {
        tracing::info!("Fake depth sensor started");
        Ok(())
    }

    fn close(&mut self) -> sensekit::Result<()> {
        tracing::info!(frames = self.frame_index, "Fake depth sensor stopped");
        Ok(())
    }

    fn read(&mut self, _timeout: Duration) -> sensekit::Result<()> {
        let mut guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let Some(writer) = guard.as_mut() else {
            return Err(Error::Timeout);
        };

        // Nobody is watching, skip the work
        if !writer.has_connections() {
            return Ok(());
        }

        self.frame_index += 1;
        let Some(buffer) = writer.begin_write(self.frame_index) else {
            return Ok(());
        };

        let offset = self.frame_index as usize;
        for (i, pixel) in buffer.data_mut().chunks_exact_mut(2).enumerate() {
            let depth = ((i % WIDTH + offset) % 4096) as u16;
            pixel.copy_from_slice(&depth.to_le_bytes());
        }
        writer.cycle()?;
        Ok(())
    }

    fn connection_added(&mut self, _connection: ConnectionHandle) -> Option<BinHandle> {
        let guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(BinWriter::handle)
    }

    fn get_parameter(
        &mut self,
        _connection: ConnectionHandle,
        id: u32,
        bins: &mut ParameterBinPool,
    ) -> sensekit::Result<ParameterBinHandle> {
        if id != PARAM_RESOLUTION {
            return Err(Error::InvalidArgument(format!("unknown parameter {}", id)));
        }

        let (handle, data) = bins.get_parameter_bin(8)?;
        data[..4].copy_from_slice(&(WIDTH as u32).to_le_bytes());
        data[4..].copy_from_slice(&(HEIGHT as u32).to_le_bytes());
        Ok(handle)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let frames: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 10,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sensekit=debug".parse()?)
                .add_directive("sensor_pipeline=debug".parse()?),
        )
        .init();

    let config = ServiceConfig::default()
        .read_timeout(Duration::from_millis(20))
        .update_interval(Duration::from_millis(33));
    let host = Arc::new(ServiceHost::new(PluginService::new(config)));

    // Plugin side
    let depth = {
        let mut service = host.lock();

        service.register_host_event_callback(|event| {
            tracing::info!(event = event.name(), "Plugin received host event");
        });

        let set = service.create_stream_set("astra://sensor0")?;
        let writer = Arc::new(Mutex::new(None));
        let depth = service.create_stream(
            set,
            StreamDescription::of(StreamType::Depth),
            FakeDepth {
                writer: Arc::clone(&writer),
                frame_index: 0,
            },
        )?;

        let bin = service.create_stream_bin(depth, WIDTH * HEIGHT * 2)?;
        *writer.lock().unwrap_or_else(|e| e.into_inner()) = Some(bin);

        service.log(
            "fake_depth",
            LogSeverity::Info,
            format_args!("publishing {}x{} depth", WIDTH, HEIGHT),
        );
        depth
    };

    // Host side
    host.lock().register_stream_registered_callback(|args| {
        tracing::info!(uri = %args.uri, stream = %args.stream, kind = %args.description, "Stream available");
    });

    let updates = host.spawn_update_task();

    let connection = host.lock().open_stream_connection(depth)?;
    let resolution = host
        .lock()
        .get_parameter(connection.handle(), PARAM_RESOLUTION)?;
    tracing::info!(bytes = resolution.len(), "Resolution parameter received");

    let mut after = 0;
    for _ in 0..frames {
        let frame = connection
            .wait_for_frame(after, Duration::from_secs(1))
            .await?;
        after = frame.generation;

        let center = (HEIGHT / 2 * WIDTH + WIDTH / 2) * 2;
        let value = u16::from_le_bytes([frame.data[center], frame.data[center + 1]]);
        tracing::info!(
            frame = frame.frame_index,
            generation = frame.generation,
            center_mm = value,
            "Depth frame"
        );
    }

    {
        let mut service = host.lock();
        service.close_stream_connection(connection.handle())?;
        service.raise_host_event(HostEvent::Custom {
            id: 1,
            data: bytes::Bytes::from_static(b"done"),
        });
        service.shutdown();
    }

    updates.await?;
    Ok(())
}
