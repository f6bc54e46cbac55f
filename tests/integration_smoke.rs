use std::io::Write;

use nlb_core::{
    corpus::{read_binary, read_embedding, write_binary},
    eval::evaluate_dir,
    persistence::{self, ModelMetadata},
    Binarizer, HammingSimilarityEngine, NlbConfig, TrainingOrchestrator, VocabIndex,
};

/// Two clusters in 8 dimensions: animals along +x, fruit along -x.
const EMBEDDING: &str = "\
6 8
cat 0.9 0.1 0.2 0.0 0.1 0.0 0.3 0.1
dog 0.8 0.2 0.1 0.1 0.0 0.1 0.3 0.0
tiger 0.9 0.0 0.3 0.0 0.1 0.1 0.2 0.1
apple -0.9 0.1 -0.2 0.0 0.1 0.0 -0.3 0.1
pear -0.8 0.0 -0.1 0.1 0.0 0.1 -0.3 0.0
banana -0.9 0.2 -0.3 0.0 0.1 0.1 -0.2 0.1
";

#[test]
fn smoke_train_search_evaluate() {
    // 1. Setup Dummy Data
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("vectors.txt");
    let mut file = std::fs::File::create(&input).unwrap();
    file.write_all(EMBEDDING.as_bytes()).unwrap();
    drop(file);

    let datasets = dir.path().join("datasets");
    std::fs::create_dir(&datasets).unwrap();
    std::fs::write(
        datasets.join("toy.txt"),
        "Cat Dog 9.0\ncat tiger 8.5\ncat apple 1.0\ndog pear 0.5\napple unicorn 2.0\n",
    )
    .unwrap();

    // 2. Train + binarize
    let embedding = read_embedding(&input).unwrap();
    let config = NlbConfig {
        n_bits: 128,
        batch_size: 4,
        epochs: 3,
        seed: 7,
        ..NlbConfig::default()
    };
    let orchestrator = TrainingOrchestrator::new(config).unwrap();
    let (model, codes) = orchestrator.run(&embedding).unwrap();
    assert_eq!(codes.len(), 6);
    assert_eq!(codes.n_bits(), 128);

    // 3. Codes survive the text format
    let output = dir.path().join("vectors.bin.txt");
    write_binary(&output, &codes).unwrap();
    let loaded = read_binary(&output).unwrap();
    assert_eq!(loaded, codes);

    // 4. Search
    let vocab = VocabIndex::from_words(loaded.words(), false);
    let engine = HammingSimilarityEngine::new(&loaded);
    let cat = vocab.get_index("cat").unwrap();
    let neighbors = engine.top_k(cat, 3).unwrap();
    assert_eq!(neighbors.len(), 3);
    assert!(neighbors.iter().all(|n| n.index != cat));
    assert_eq!(engine.sim(cat, cat), 1.0);

    // 5. Evaluate
    let reports = evaluate_dir(&datasets, &vocab, |a, b| engine.sim(a, b)).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].pairs_total, 5);
    assert_eq!(reports[0].pairs_found, 4);

    // 6. Saved model binarizes identically
    let model_dir = dir.path().join("model");
    let metadata = ModelMetadata::new(orchestrator.config(), &model);
    persistence::save_model(&model_dir, &metadata, &model).unwrap();
    let (_, reloaded) = persistence::load_model(&model_dir).unwrap();
    let again = Binarizer::from_model(&reloaded)
        .unwrap()
        .binarize_embedding(&embedding)
        .unwrap();
    assert_eq!(again, codes);
}

#[test]
fn short_embedding_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("short.txt");
    std::fs::write(&input, "3 2\na 1 2\nb 3 4\n").unwrap();
    assert!(read_embedding(&input).is_err());
}
