use anyhow::{Result, bail};
use clap::Parser;
use larynx::cli::{Cli, Commands, default_config_path};
use larynx::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Devices) => list_audio_devices(),
        None => {
            let config = load_config(&cli)?;
            run_record(config, cli.duration)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => match default_config_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    }
    .with_env_overrides();

    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(model) = &cli.model {
        config.stt.model_path = model.display().to_string();
    }

    config.validate()?;
    Ok(config)
}

#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = larynx::audio::capture::list_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found");
    } else {
        println!("Audio input devices:");
        for device in devices {
            println!("  {}", device);
        }
    }
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    bail!("built without the 'cpal-audio' feature; device capture is unavailable")
}

#[cfg(all(feature = "cpal-audio", feature = "vosk"))]
fn build_recognizer(config: &Config) -> Result<Box<dyn larynx::Recognizer>> {
    if config.stt.model_path.is_empty() {
        bail!("no model configured; pass --model or set stt.model_path in the config");
    }
    let recognizer = larynx::stt::VoskRecognizer::new(
        std::path::Path::new(&config.stt.model_path),
        config.audio.sample_rate,
    )?;
    Ok(Box::new(recognizer))
}

#[cfg(all(feature = "cpal-audio", feature = "vosk"))]
fn run_record(config: Config, duration: Option<u64>) -> Result<()> {
    use larynx::audio::capture::CpalAudioSource;
    use larynx::pipeline::PipelineController;
    use std::io::Write;
    use std::time::{Duration, Instant};

    let recognizer = build_recognizer(&config)?;
    let controller = PipelineController::new(config, recognizer, |audio_config| {
        Ok(Box::new(CpalAudioSource::open(audio_config)?))
    })?;
    let errors = controller.errors();

    controller.start()?;
    println!("Recording... press Enter to stop.");

    // Enter on stdin ends the session; --duration is a fallback deadline.
    let (stdin_tx, stdin_rx) = crossbeam_channel::bounded::<()>(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = stdin_tx.send(());
    });

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let poll = Duration::from_millis(100);
    let mut last_render = String::new();

    loop {
        if stdin_rx.recv_timeout(poll).is_ok() {
            break;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }
        if let Ok(err) = errors.try_recv() {
            eprintln!("larynx: {err}");
            break;
        }

        let snapshot = controller.snapshot();
        let rendered = snapshot.full_text();
        if rendered != last_render {
            print!("\r\x1b[K{}", rendered);
            let _ = std::io::stdout().flush();
            last_render = rendered;
        }
    }

    println!();
    controller.stop()?;

    let snapshot = controller.snapshot();
    if snapshot.committed.is_empty() {
        println!("(no speech recognized)");
    } else {
        println!("{}", snapshot.committed);
        println!(
            "-- {} words, {} frame(s) dropped",
            controller.word_count(),
            controller.dropped_frames()
        );
    }

    Ok(())
}

#[cfg(not(all(feature = "cpal-audio", feature = "vosk")))]
fn run_record(_config: Config, _duration: Option<u64>) -> Result<()> {
    bail!(
        "recording requires the 'cpal-audio' and 'vosk' features; \
         rebuild with: cargo build --features cpal-audio,vosk"
    )
}
