//! Training driver: `Init → (TrainPass → ValPass → Decide) × epochs → Finalize`.
//!
//! Training runs on an autodiff backend; validation runs on its inner
//! backend through [`AutodiffModule::valid`].

use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    tensor::backend::{AutodiffBackend, Backend},
};

use super::{
    aggregator::{EpochAggregator, RunOutcome},
    checkpoint::CheckpointStore,
    passes::{ValPass, ValidationReport},
    summary::save_history,
};
use crate::{
    config::RunConfig,
    dataset::SegBatch,
    error::{SegEvalError, SegEvalResult},
    losses::CompositeLossConfig,
    models::SegmentationModel,
};

/// Train `model` for `config.epochs` epochs.
///
/// After every epoch the validation mIoU is compared with the best so far;
/// a strict improvement persists the model through `store` at
/// [`RunConfig::best_checkpoint_path`]. When the run ends the summary and the
/// per-epoch history are written to the output directory.
///
/// # Errors
///
/// Returns configuration errors before the first epoch, and any batch,
/// checkpoint or I/O error as soon as it happens. A loader that stops before
/// yielding every item fails the epoch with `SegEvalError::Dataset`.
pub fn fit<B, M, O, S>(
    config: &RunConfig,
    mut model: M,
    mut optimizer: O,
    train_loader: &dyn DataLoader<B, SegBatch<B>>,
    valid_loader: &dyn DataLoader<B::InnerBackend, SegBatch<B::InnerBackend>>,
    store: &mut S,
    device: &B::Device,
) -> SegEvalResult<(M, RunOutcome)>
where
    B: AutodiffBackend,
    M: SegmentationModel<B> + AutodiffModule<B>,
    M::InnerModule: SegmentationModel<B::InnerBackend>,
    O: Optimizer<M, B>,
    S: CheckpointStore<B, M>,
{
    let mut aggregator = EpochAggregator::new(config)?;
    let checkpoint_path = config.best_checkpoint_path();

    let loss_config = CompositeLossConfig::new().with_dice_weight(config.dice_weight);
    let train_loss = loss_config.init::<B>(device);
    let valid_loss = loss_config.init::<B::InnerBackend>(device);

    tracing::info!(
        epochs = config.epochs,
        batch_size = config.batch_size,
        learning_rate = config.learning_rate,
        dice_weight = config.dice_weight,
        fg_class = config.fg_class,
        "starting training"
    );

    for epoch in 1..=config.epochs {
        let mut train = aggregator.train_pass();
        for batch in train_loader.iter() {
            let scores = model.forward(batch.images);
            let loss = train.step(&train_loss, scores, batch.masks)?;
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }
        ensure_complete("training", train.samples(), train_loader.num_items())?;

        let valid_model = model.valid();
        let mut val = aggregator.val_pass();
        for batch in valid_loader.iter() {
            let scores = valid_model.forward(batch.images);
            val.step(&valid_loss, scores, batch.masks)?;
        }
        ensure_complete("validation", val.samples(), valid_loader.num_items())?;

        let decision = aggregator.decide(epoch, &train, val);
        tracing::info!("{}", decision.record);

        if decision.improved {
            store.save(&model, &checkpoint_path)?;
            tracing::info!(
                epoch,
                mean_iou = decision.record.mean_iou,
                path = %checkpoint_path.display(),
                "new best checkpoint"
            );
        }
    }

    let outcome = aggregator.finish();
    save_history(&outcome.history, &config.history_path())?;
    if let Some(summary) = &outcome.summary {
        summary.save(&config.summary_path())?;
        tracing::info!(
            best_miou = summary.best_miou,
            weights = %summary.weights,
            "training finished"
        );
    }

    Ok((model, outcome))
}

/// Run a single validation pass of `model` over `loader`.
///
/// # Errors
///
/// Returns configuration errors, the first batch that fails, and
/// `SegEvalError::Dataset` if the loader stops before yielding every item.
pub fn evaluate<B, M>(
    config: &RunConfig,
    model: &M,
    loader: &dyn DataLoader<B, SegBatch<B>>,
    device: &B::Device,
) -> SegEvalResult<ValidationReport>
where
    B: Backend,
    M: SegmentationModel<B>,
{
    config.validate()?;
    let loss = CompositeLossConfig::new()
        .with_dice_weight(config.dice_weight)
        .init::<B>(device);

    let mut val = ValPass::new(config.num_classes, config.fg_class, config.epsilon);
    for batch in loader.iter() {
        let scores = model.forward(batch.images);
        val.step(&loss, scores, batch.masks)?;
    }
    ensure_complete("evaluation", val.samples(), loader.num_items())?;

    let report = val.finish();
    tracing::info!(
        samples = report.samples,
        val_loss = report.val_loss,
        mean_iou = report.mean_iou,
        "{}",
        report.foreground
    );
    Ok(report)
}

/// Fail a pass that saw fewer samples than its loader holds.
fn ensure_complete(pass: &str, samples: usize, expected: usize) -> SegEvalResult<()> {
    if samples != expected {
        return Err(SegEvalError::Dataset {
            message: format!("{pass} pass ended after {samples} of {expected} items"),
        });
    }
    Ok(())
}
