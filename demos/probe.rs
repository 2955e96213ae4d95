use std::path::PathBuf;
use std::time::{Duration, Instant};

use voice_probe::{
    hosts::memory::InMemorySynthesis, timer::TokioTimer, ProbeOptionsBuilder, Voice, VoiceProbe,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let language = args.next();
    let voices_path = args.next().map(PathBuf::from);

    // Without a voice file, simulate a host that loads its voices asynchronously.
    let host = match &voices_path {
        Some(path) => InMemorySynthesis::from_json(&std::fs::read_to_string(path)?)?,
        None => {
            let host = InMemorySynthesis::new();
            let loader = host.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(250)).await;
                loader.set_voices(vec![
                    Voice::new("Samantha", "en-US"),
                    Voice::new("Thomas", "fr-FR"),
                    Voice::new("Anna", "de-DE"),
                ]);
            });
            host
        }
    };

    let options = ProbeOptionsBuilder::default()
        .fallback_timeout(Duration::from_secs(1))
        .build()?;
    let probe = VoiceProbe::with_options(host, TokioTimer, options);

    let start = Instant::now();
    match probe.find(language.as_deref()).await {
        Ok(voice) => println!(
            "Found '{}' ({}) in {:.2?}",
            voice.name,
            voice.lang,
            start.elapsed()
        ),
        Err(e) => println!("{e} (after {:.2?})", start.elapsed()),
    }

    Ok(())
}
