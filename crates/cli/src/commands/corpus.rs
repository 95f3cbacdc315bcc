//! `schoolpilot corpus`: print the grounding text built from the corpus.

use schoolpilot_agent::KnowledgeCorpus;
use std::path::{Path, PathBuf};

pub fn run(
    config_path: Option<&Path>,
    path_override: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = match path_override {
        Some(path) => path,
        None => super::load_config(config_path)?.knowledge.corpus_path,
    };

    let corpus = KnowledgeCorpus::load(&path)?;
    eprintln!("{} schools from {}", corpus.len(), path.display());
    print!("{}", corpus.render());

    Ok(())
}
