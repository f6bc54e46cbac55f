use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use nlb_core::{
    corpus::{read_binary, read_embedding, write_binary},
    eval::{evaluate_dir, DatasetReport},
    persistence, Binarizer, HammingSimilarityEngine, NlbConfig, NlbError, TrainingOrchestrator,
    VocabIndex,
};

#[derive(Parser, Debug)]
#[command(name = "nlb", about = "Near-lossless binarization of word embeddings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Learn a projection from real vectors and write their binary codes.
    Train {
        /// Real-valued embedding file
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output file for the binary codes
        #[arg(long)]
        output: Option<PathBuf>,
        /// Path to config file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Code length, a multiple of 64
        #[arg(long)]
        n_bits: Option<usize>,
        /// Reconstruction learning rate
        #[arg(long)]
        lr_rec: Option<f32>,
        /// Decorrelation learning rate
        #[arg(long)]
        lr_reg: Option<f32>,
        /// Rows per mini-batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Number of epochs
        #[arg(long)]
        epoch: Option<usize>,
        /// Initialization seed
        #[arg(long)]
        seed: Option<u64>,
        /// Directory to save the trained projection to
        #[arg(long)]
        save_model: Option<PathBuf>,
    },

    /// Binarize real vectors with a saved projection.
    Binarize {
        /// Model directory written by `train --save-model`
        #[arg(long)]
        model: PathBuf,
        /// Real-valued embedding file
        #[arg(long)]
        input: PathBuf,
        /// Output file for the binary codes
        #[arg(long)]
        output: PathBuf,
    },

    /// Print the nearest neighbors of query words.
    Topk {
        /// Binary codes file (or real-valued file with --real)
        #[arg(long)]
        input: PathBuf,
        /// Number of neighbors per query
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// Treat the input as real vectors and rank by cosine similarity
        #[arg(long)]
        real: bool,
        /// Query words
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Score embeddings on every word-similarity dataset in a directory.
    Evaluate {
        /// Binary codes file (or real-valued file with --real)
        #[arg(long)]
        input: PathBuf,
        /// Directory of `word word score` files
        #[arg(long)]
        datasets: PathBuf,
        /// Treat the input as real vectors and score by cosine similarity
        #[arg(long)]
        real: bool,
    },
}

/// Flags of `train` that override the configuration file.
#[derive(Debug, Default)]
struct TrainOverrides {
    n_bits: Option<usize>,
    lr_rec: Option<f32>,
    lr_reg: Option<f32>,
    batch_size: Option<usize>,
    epochs: Option<usize>,
    seed: Option<u64>,
}

impl TrainOverrides {
    fn apply(&self, config: &mut NlbConfig) {
        if let Some(v) = self.n_bits {
            config.n_bits = v;
        }
        if let Some(v) = self.lr_rec {
            config.lr_rec = v;
        }
        if let Some(v) = self.lr_reg {
            config.lr_reg = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.epochs {
            config.epochs = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            input,
            output,
            config,
            n_bits,
            lr_rec,
            lr_reg,
            batch_size,
            epoch,
            seed,
            save_model,
        } => {
            let overrides = TrainOverrides {
                n_bits,
                lr_rec,
                lr_reg,
                batch_size,
                epochs: epoch,
                seed,
            };
            cmd_train(input, output, config, &overrides, save_model)?;
        }
        Commands::Binarize {
            model,
            input,
            output,
        } => {
            cmd_binarize(&model, &input, &output)?;
        }
        Commands::Topk {
            input,
            k,
            real,
            words,
        } => {
            cmd_topk(&input, k, real, &words)?;
        }
        Commands::Evaluate {
            input,
            datasets,
            real,
        } => {
            cmd_evaluate(&input, &datasets, real)?;
        }
    }

    Ok(())
}

fn cmd_train(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    overrides: &TrainOverrides,
    save_model: Option<PathBuf>,
) -> anyhow::Result<()> {
    // 1) Required paths and config, before touching any data
    let input = input.ok_or_else(|| NlbError::Config("missing --input".into()))?;
    let output = output.ok_or_else(|| NlbError::Config("missing --output".into()))?;

    let mut config = match config_path {
        Some(path) => NlbConfig::from_json_file(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => NlbConfig::default(),
    };
    overrides.apply(&mut config);
    let orchestrator = TrainingOrchestrator::new(config)?;
    println!("Using config: {:?}", orchestrator.config());

    // 2) Load vectors
    let embedding = read_embedding(&input)
        .with_context(|| format!("Failed to load embedding {}", input.display()))?;
    println!(
        "Loaded {} vectors of dimension {}.",
        embedding.len(),
        embedding.n_dims()
    );

    // 3) Train + binarize
    let (model, codes) = orchestrator.run(&embedding)?;

    // 4) Save
    write_binary(&output, &codes)
        .with_context(|| format!("Failed to write codes {}", output.display()))?;
    println!(
        "Wrote {} codes of {} bits to {}.",
        codes.len(),
        codes.n_bits(),
        output.display()
    );

    if let Some(dir) = save_model {
        let metadata = persistence::ModelMetadata::new(orchestrator.config(), &model);
        persistence::save_model(&dir, &metadata, &model)?;
        println!("Model saved to {}.", dir.display());
    }

    Ok(())
}

fn cmd_binarize(model_dir: &Path, input: &Path, output: &Path) -> anyhow::Result<()> {
    let (metadata, model) = persistence::load_model(model_dir)?;
    println!(
        "Loaded {}x{} projection (created {}).",
        metadata.n_bits, metadata.n_dims, metadata.created_at
    );

    let embedding = read_embedding(input)
        .with_context(|| format!("Failed to load embedding {}", input.display()))?;
    let codes = Binarizer::from_model(&model)?.binarize_embedding(&embedding)?;

    write_binary(output, &codes)
        .with_context(|| format!("Failed to write codes {}", output.display()))?;
    println!("Wrote {} codes to {}.", codes.len(), output.display());
    Ok(())
}

fn cmd_topk(input: &Path, k: usize, real: bool, queries: &[String]) -> anyhow::Result<()> {
    if real {
        let embedding = read_embedding(input)
            .with_context(|| format!("Failed to load embedding {}", input.display()))?;
        let vocab = VocabIndex::from_words(embedding.words(), false);
        for word in queries {
            let Some(index) = vocab.get_index(word) else {
                println!("Word '{}' is not in the vocabulary.", word);
                continue;
            };
            print_neighbors(word, &embedding.top_k(index, k)?, |i| embedding.word(i));
        }
    } else {
        let codes = read_binary(input)
            .with_context(|| format!("Failed to load codes {}", input.display()))?;
        let vocab = VocabIndex::from_words(codes.words(), false);
        let engine = HammingSimilarityEngine::new(&codes);
        for word in queries {
            let Some(index) = vocab.get_index(word) else {
                println!("Word '{}' is not in the vocabulary.", word);
                continue;
            };
            print_neighbors(word, &engine.top_k(index, k)?, |i| codes.word(i));
        }
    }
    Ok(())
}

fn print_neighbors<'a>(
    query: &str,
    neighbors: &[nlb_core::Neighbor],
    word: impl Fn(usize) -> Option<&'a str>,
) {
    println!("Query: '{}'", query);
    if neighbors.is_empty() {
        println!("  No neighbors found.");
    }
    for (rank, n) in neighbors.iter().enumerate() {
        println!(
            "  {:>3}. {:<20} {:.4}",
            rank + 1,
            word(n.index).unwrap_or("?"),
            n.similarity
        );
    }
}

fn cmd_evaluate(input: &Path, datasets: &Path, real: bool) -> anyhow::Result<()> {
    let result = if real {
        let embedding = read_embedding(input)
            .with_context(|| format!("Failed to load embedding {}", input.display()))?;
        let vocab = VocabIndex::from_words(embedding.words(), false);
        evaluate_dir(datasets, &vocab, |a, b| embedding.sim(a, b))
    } else {
        let codes = read_binary(input)
            .with_context(|| format!("Failed to load codes {}", input.display()))?;
        let vocab = VocabIndex::from_words(codes.words(), false);
        let engine = HammingSimilarityEngine::new(&codes);
        evaluate_dir(datasets, &vocab, |a, b| engine.sim(a, b))
    };
    let reports =
        result.with_context(|| format!("Failed to read datasets in {}", datasets.display()))?;

    print_reports(&reports);
    Ok(())
}

fn print_reports(reports: &[DatasetReport]) {
    println!("{:<12} | {:<8} | {:>3}", "Filename", "Spearman", "OOV");
    println!("==============================");
    for r in reports {
        let rho = r
            .spearman
            .map_or_else(|| "n/a".to_string(), |s| format!("{s:.3}"));
        println!(
            "{:<12} | {:>8} | {:>3.0}%",
            r.name,
            rho,
            r.oov_ratio() * 100.0
        );
    }
}
