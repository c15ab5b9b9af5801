//! Miso - terminal noise-masking player

mod app;
mod input;
mod ui;

use std::fs::{self, File};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use miso_audio::{AudioGraph, PlaybackController, PlaybackEvent, SharedGraph};
use miso_library::{
    ClipCache, ClipFetcher, ClipFormat, ClipLoader, Config, DirFetcher, FileSettings,
    HttpFetcher, OfflineFetcher, OfflineStore, CACHE_VERSION,
};

use app::AppState;
use input::Command;
use ui::Theme;

/// Frame rate for UI updates
const FPS: u64 = 30;

/// Largest callback we convert without reallocating, in stereo samples
const CONVERSION_BUFFER_LEN: usize = 16384;

fn main() -> anyhow::Result<()> {
    init_logging();

    let precache_only = std::env::args().any(|arg| arg == "--precache");
    let config = Config::load();
    if !Config::config_path().exists() {
        // Leave an editable file behind on first run
        if let Err(e) = config.save() {
            warn!(error = %e, "could not write default config");
        }
    }
    let format = ClipFormat::detect().context("no supported clip format")?;
    info!(?format, clip_root = %config.clip_root, "starting");

    let fetcher = build_fetcher(&config, precache_only)?;
    if precache_only {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no audio output device found")?;
    let stream_config = device
        .default_output_config()
        .context("failed to get audio config")?;
    let sample_rate = stream_config.sample_rate().0;
    let channels = stream_config.channels() as usize;

    let graph = AudioGraph::shared(sample_rate);
    let stream = build_stream(&device, stream_config.into(), channels, graph.clone())?;
    stream.play().context("failed to start audio")?;

    let cache = ClipCache::new(fetcher, format, sample_rate);
    let loader = ClipLoader::spawn(cache);
    let (event_tx, event_rx) = PlaybackController::create_channel();
    let controller = PlaybackController::new(
        graph,
        loader,
        Box::new(FileSettings::load()),
        event_tx,
    );

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, controller, event_rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    drop(stream);
    result
}

/// Log to `<data_dir>/miso/miso.log`; the terminal belongs to the UI
fn init_logging() {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("miso");
    let file = fs::create_dir_all(&dir).and_then(|_| {
        File::options()
            .create(true)
            .append(true)
            .open(dir.join("miso.log"))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .try_init(),
        Err(_) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init(),
    };
}

/// Pick the clip source from the config, wrapped in the offline store when enabled
fn build_fetcher(config: &Config, precache: bool) -> anyhow::Result<Box<dyn ClipFetcher>> {
    let upstream: Box<dyn ClipFetcher> = if config.is_remote() {
        Box::new(HttpFetcher::new(&config.clip_root)?)
    } else {
        Box::new(DirFetcher::new(&config.clip_root))
    };

    if !config.offline_cache {
        if precache {
            warn!("offline cache disabled, nothing to precache");
        }
        return Ok(upstream);
    }

    let store = match OfflineStore::open(&OfflineStore::default_path(), CACHE_VERSION) {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "offline store unavailable");
            return Ok(upstream);
        }
    };
    let fetcher = OfflineFetcher::new(store, upstream);

    if precache {
        let paths = OfflineFetcher::<Box<dyn ClipFetcher>>::asset_paths();
        let stored = fetcher.precache(&paths);
        info!(stored, total = paths.len(), "precache finished");
        println!("Stored {stored} of {} clips for offline use", paths.len());
    }

    Ok(Box::new(fetcher))
}

fn build_stream(
    device: &cpal::Device,
    config: cpal::StreamConfig,
    channels: usize,
    graph: SharedGraph,
) -> anyhow::Result<cpal::Stream> {
    // Avoid allocation in the audio callback
    let mut conversion_buffer = vec![0.0f32; CONVERSION_BUFFER_LEN];

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            // On contention output silence rather than block the audio thread
            let Some(mut graph) = graph.try_lock() else {
                data.fill(0.0);
                return;
            };

            if channels == 2 {
                graph.process(data);
                return;
            }

            let frames = (data.len() / channels.max(1)).min(CONVERSION_BUFFER_LEN / 2);
            let stereo = &mut conversion_buffer[..frames * 2];
            graph.process(stereo);
            data.fill(0.0);
            for (frame, out) in data.chunks_mut(channels.max(1)).take(frames).enumerate() {
                let (left, right) = (stereo[frame * 2], stereo[frame * 2 + 1]);
                if out.len() == 1 {
                    out[0] = (left + right) * 0.5;
                } else {
                    out[0] = left;
                    out[1] = right;
                }
            }
        },
        |err| error!(error = %err, "audio stream error"),
        None,
    )?;
    Ok(stream)
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut controller: PlaybackController,
    event_rx: crossbeam_channel::Receiver<PlaybackEvent>,
) -> anyhow::Result<()> {
    let mut app = AppState::new(controller.band_gains());
    let theme = Theme::default();
    let frame_duration = Duration::from_millis(1000 / FPS);

    while !app.should_quit {
        let frame_start = Instant::now();

        controller.poll();
        while let Ok(event) = event_rx.try_recv() {
            app.handle_playback_event(event);
        }

        terminal.draw(|frame| ui::render(frame, &app, &theme))?;

        let timeout = frame_duration.saturating_sub(frame_start.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(cmd) = input::handle_key(key) {
                    handle_command(&mut app, &mut controller, cmd);
                }
            }
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_duration {
            thread::sleep(frame_duration - elapsed);
        }
    }

    Ok(())
}

fn handle_command(app: &mut AppState, controller: &mut PlaybackController, cmd: Command) {
    match cmd {
        Command::Select(noise) => {
            app.select(noise);
            controller.select(noise);
        }
        Command::FocusBand(delta) => app.focus_band(delta),
        Command::AdjustBand(delta) => {
            let band = app.focused_band;
            let stored = controller.set_band_gain(band, app.gains[band] + delta);
            app.gains[band] = stored;
        }
        Command::FlattenEqualizer => {
            controller.flatten_equalizer();
            app.gains = controller.band_gains();
        }
        Command::MuteEqualizer => {
            controller.mute_equalizer();
            app.gains = controller.band_gains();
        }
        Command::Quit => app.should_quit = true,
    }
}
