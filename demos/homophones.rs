use std::path::PathBuf;
use std::time::Instant;

use homophone_rs::{
    phonetic::{BuildEvent, EngineParams, HomophoneEngine, SearchRequestBuilder},
    HomophoneFinder,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let dictionary = args.next().unwrap_or_else(|| "data/cmudict.dict".to_string());
    let frequencies = args.next().unwrap_or_else(|| "data/zipf.tsv".to_string());
    let words: Vec<String> = args.collect();
    let words = if words.is_empty() {
        vec!["night".to_string(), "there".to_string(), "read".to_string()]
    } else {
        words
    };

    let engine = HomophoneEngine::new(EngineParams {
        dictionary_path: Some(PathBuf::from(dictionary)),
        frequency_path: Some(PathBuf::from(frequencies)),
        progress_step: 10,
        ..EngineParams::default()
    })?;

    let build_start = Instant::now();
    for event in engine.build_index().subscribe() {
        match event {
            BuildEvent::Progress(p) => println!("Indexing... {p}%"),
            BuildEvent::Ready(stats) => println!(
                "Index ready in {:.2?}: {} words, {} sequences",
                build_start.elapsed(),
                stats.words,
                stats.sequences
            ),
            BuildEvent::Failed(err) => return Err(err.into()),
        }
    }

    for word in &words {
        let search_start = Instant::now();
        let outcome = engine.find(word)?;
        println!("{word}: {} ({:.2?})", outcome.summary(), search_start.elapsed());
        for homophone in outcome.words() {
            println!("  • {homophone}");
        }
    }

    // Looser matching, no frequency filter, everything returned
    let request = SearchRequestBuilder::default()
        .word(words[0].as_str())
        .threshold(75u8)
        .result_cap(0usize)
        .use_freq_filter(false)
        .build()?;
    let outcome = engine.search(request)?.wait()?;
    println!("{} (threshold 75): {}", words[0], outcome.summary());
    for homophone in outcome.words() {
        println!("  • {homophone}");
    }

    Ok(())
}
