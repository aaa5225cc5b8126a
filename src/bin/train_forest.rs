//! Random forest trainer.
//!
//! Trains a layered random forest over one or more worker threads and
//! optionally evaluates it on held-out data. Runs as a single client over an
//! in-process aggregation store; multi-client deployments embed the library
//! with a networked store instead.
//!
//! Usage:
//!   cargo run --bin train_forest --release -- --train <path> [options]
//!
//! Data files are libsvm or binary, described by a `<path>.meta` sidecar.
//!
//! Options:
//!   --train <path>            Training data
//!   --test <path>             Test data
//!   --num-trees <n>           Total trees per layer (default: 100)
//!   --num-layers <n>          Cascade layers (default: 1)
//!   --num-threads <n>         Worker threads (default: 1)
//!   --max-depth <n>           Tree depth limit, 0 = unlimited (default: 16)
//!   --data-subsample <n>      Bootstrap draws per tree, 0 = every instance
//!   --feature-subsample <n>   Candidate features per node, 0 = sqrt(dim)
//!   --seed <n>                Run seed (default: 0)
//!   --perform-test            Vote on train and test data, report errors
//!   --compute-importance      Log per-feature gain ratio shares
//!   --save-trees <base>       Save each worker's forest under this base
//!   --load-trees <path>       Evaluate a saved forest instead of training
//!   --save-pred <path>        Write per-test-instance predictions
//!   --output-proba            Prediction lines carry vote shares
//!   --save-report <path>      Write the run summary
//!   --quiet                   Warnings only
//!   --verbose                 Per-phase detail

use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::Arc;

use foresters::data::{load_dataset, DataMeta, Dataset};
use foresters::training::{EngineParams, ForestEngine, MemStore, StoreLayout, Verbosity};

// =============================================================================
// Argument parsing
// =============================================================================

#[derive(Debug)]
struct Args {
	train: Option<PathBuf>,
	test: Option<PathBuf>,
	params: EngineParams,
}

fn parse_args() -> Args {
	let mut train: Option<PathBuf> = None;
	let mut test: Option<PathBuf> = None;
	let mut params = EngineParams {
		num_trees: 100,
		..EngineParams::default()
	};

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--train" => train = Some(PathBuf::from(it.next().expect("--train path"))),
			"--test" => test = Some(PathBuf::from(it.next().expect("--test path"))),
			"--num-trees" => params.num_trees = it.next().expect("--num-trees value").parse().unwrap(),
			"--num-layers" => params.num_layers = it.next().expect("--num-layers value").parse().unwrap(),
			"--num-threads" => params.num_threads = it.next().expect("--num-threads value").parse().unwrap(),
			"--max-depth" => params.tree.max_depth = it.next().expect("--max-depth value").parse().unwrap(),
			"--data-subsample" => {
				params.tree.num_data_subsample = it.next().expect("--data-subsample value").parse().unwrap()
			}
			"--feature-subsample" => {
				params.tree.num_features_subsample =
					it.next().expect("--feature-subsample value").parse().unwrap()
			}
			"--seed" => params.seed = it.next().expect("--seed value").parse().unwrap(),
			"--perform-test" => params.perform_test = true,
			"--compute-importance" => params.compute_importance = true,
			"--save-trees" => params.save_trees = Some(PathBuf::from(it.next().expect("--save-trees base"))),
			"--load-trees" => params.load_trees = Some(PathBuf::from(it.next().expect("--load-trees path"))),
			"--save-pred" => {
				params.save_predictions = Some(PathBuf::from(it.next().expect("--save-pred path")))
			}
			"--output-proba" => params.output_proba = true,
			"--save-report" => params.save_report = Some(PathBuf::from(it.next().expect("--save-report path"))),
			"--quiet" => params.verbosity = Verbosity::Warning,
			"--verbose" => params.verbosity = Verbosity::Debug,
			"--help" => {
				eprintln!(
					"train_forest\n\n  --train <path>  --test <path>\n  --num-trees <n>  --num-layers <n>  --num-threads <n>\n  --max-depth <n>  --data-subsample <n>  --feature-subsample <n>\n  --seed <n>  --perform-test  --compute-importance\n  --save-trees <base>  --load-trees <path>\n  --save-pred <path>  --output-proba  --save-report <path>\n  --quiet  --verbose"
				);
				exit(0);
			}
			other => panic!("unknown arg: {other}"),
		}
	}

	Args { train, test, params }
}

fn fail(message: &str) -> ! {
	eprintln!("train_forest: {message}");
	exit(1);
}

// =============================================================================
// Main
// =============================================================================

fn load_or_fail(path: &Path) -> (DataMeta, Dataset) {
	load_dataset(path).unwrap_or_else(|err| fail(&format!("failed to load {}: {err}", path.display())))
}

fn main() {
	let args = parse_args();
	if args.params.load_trees.is_some() && args.train.is_none() && args.test.is_none() {
		fail("--load-trees needs --train or --test data to evaluate against");
	}

	let (train_meta, train) = match &args.train {
		Some(path) => {
			let (meta, data) = load_or_fail(path);
			(Some(meta), data)
		}
		None if args.params.load_trees.is_some() => (None, Dataset::empty(0, 0)),
		None => fail("--train is required unless --load-trees is given"),
	};
	let test = match &args.test {
		Some(path) => {
			let (meta, data) = load_or_fail(path);
			if let Some(train_meta) = &train_meta {
				if let Err(err) = train_meta.ensure_matches(&meta) {
					fail(&format!("train and test metadata disagree: {err}"));
				}
			}
			data
		}
		None => Dataset::empty(train.feature_dim(), train.num_labels()),
	};

	let reference = if train.is_empty() { &test } else { &train };
	let layout = StoreLayout {
		num_labels: reference.num_labels(),
		feature_dim: reference.feature_dim(),
		num_trees: args.params.num_trees,
		num_train: train.len(),
		num_test: test.len(),
		num_layers: args.params.num_layers,
	};
	let store = Arc::new(MemStore::new(&layout, args.params.num_threads));

	let engine = ForestEngine::new(args.params, store, train, test)
		.unwrap_or_else(|err| fail(&err.to_string()));

	match engine.run() {
		Ok(Some(report)) => {
			println!("train_error\t{:.6}", report.train_error());
			println!("test_error\t{:.6}", report.test_error());
		}
		Ok(None) => {}
		Err(err) => fail(&err.to_string()),
	}
}
