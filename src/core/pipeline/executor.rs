//! Pipeline execution implementation.

use super::stream::{closed_stream, stream, Item, ItemReceiver, ItemSender};
use crate::error::{PipelineError, StageError};
use crate::events::{
    null_sender, Event, EventSender, PipelineEvent, PipelineSummary, StageEvent,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One link of the pipeline chain.
///
/// A stage reads items from `input` until it is closed and writes results to
/// `output`. Returning (normally, with an error, or by panicking) drops
/// `output`, which is what tells the next stage that input has ended.
pub trait Stage: Send + Sync {
    /// Name used in logs, events and errors
    fn name(&self) -> &str;

    /// Consume `input` and produce into `output`
    fn run(&self, input: ItemReceiver, output: ItemSender) -> Result<(), StageError>;
}

/// A stage backed by a closure
pub struct FnStage<F> {
    name: String,
    func: F,
}

/// Turn a closure into a named [`Stage`]
pub fn stage_fn<F>(name: impl Into<String>, func: F) -> FnStage<F>
where
    F: Fn(ItemReceiver, ItemSender) -> Result<(), StageError> + Send + Sync,
{
    FnStage {
        name: name.into(),
        func,
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(ItemReceiver, ItemSender) -> Result<(), StageError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: ItemReceiver, output: ItemSender) -> Result<(), StageError> {
        (self.func)(input, output)
    }
}

/// What a single stage did during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Position in the chain
    pub index: usize,
    /// Stage name
    pub name: String,
    /// Items the stage pushed downstream
    pub items_emitted: usize,
}

/// Result of pipeline execution
#[derive(Debug)]
pub struct PipelineOutput {
    /// Items drained from the last stage's output stream
    pub items: Vec<Item>,
    /// Per-stage reports, in chain order
    pub stages: Vec<StageReport>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
    stream_capacity: usize,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            stream_capacity: 0,
        }
    }

    /// Append a stage to the chain
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append an already boxed stage
    pub fn boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Buffer size of every stream between stages (0 = rendezvous)
    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
            stream_capacity: self.stream_capacity,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A linear chain of stages run concurrently, one thread per stage
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    stream_capacity: usize,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Number of stages in the chain
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run the pipeline without events
    pub fn run(&self) -> Result<PipelineOutput, PipelineError> {
        self.run_with_events(&null_sender())
    }

    /// Run the pipeline with event reporting.
    ///
    /// Blocks until every stage has returned. The calling thread drains the
    /// last stage's output while the stages run.
    pub fn run_with_events(&self, events: &EventSender) -> Result<PipelineOutput, PipelineError> {
        self.execute(events, Sink::Collect)
            .map(|execution| execution.output)
    }

    /// Run the pipeline, reading and dropping whatever the last stage emits.
    ///
    /// Returns how many items were drained. Nothing is buffered, so the last
    /// stage may emit without bound.
    pub fn drain(&self) -> Result<usize, PipelineError> {
        self.execute(&null_sender(), Sink::Discard)
            .map(|execution| execution.items_out)
    }

    fn execute(&self, events: &EventSender, sink: Sink) -> Result<Execution, PipelineError> {
        if self.stages.is_empty() {
            events.send(Event::Pipeline(PipelineEvent::Error {
                message: PipelineError::NoStages.to_string(),
            }));
            return Err(PipelineError::NoStages);
        }

        let start_time = Instant::now();
        let total = self.stages.len();
        info!(stages = total, capacity = self.stream_capacity, "pipeline started");
        events.send(Event::Pipeline(PipelineEvent::Started { stages: total }));

        let (items, items_out, outcomes) = thread::scope(|scope| {
            let mut upstream = closed_stream();
            let mut handles = Vec::with_capacity(total);

            for (index, stage) in self.stages.iter().enumerate() {
                let (output, next) = stream(stage.name(), self.stream_capacity);
                let input = std::mem::replace(&mut upstream, next);
                let events = events.clone();
                let stage: &dyn Stage = stage.as_ref();
                handles.push(
                    scope.spawn(move || run_stage(index, stage, input, output, &events)),
                );
            }

            let (items, items_out) = match sink {
                Sink::Collect => {
                    let items: Vec<Item> = upstream.into_iter().collect();
                    let count = items.len();
                    (items, count)
                }
                Sink::Discard => (Vec::new(), upstream.into_iter().count()),
            };

            let outcomes: Vec<StageOutcome> = handles
                .into_iter()
                .zip(self.stages.iter())
                .enumerate()
                .map(|(index, (handle, stage))| {
                    handle.join().unwrap_or_else(|payload| StageOutcome {
                        index,
                        name: stage.name().to_string(),
                        items_emitted: 0,
                        result: Err(StageError::Panicked {
                            stage: stage.name().to_string(),
                            message: panic_message(payload.as_ref()),
                        }),
                    })
                })
                .collect();

            (items, items_out, outcomes)
        });

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let stages = outcomes
            .iter()
            .map(|outcome| StageReport {
                index: outcome.index,
                name: outcome.name.clone(),
                items_emitted: outcome.items_emitted,
            })
            .collect();

        if let Some(error) = root_cause(outcomes) {
            warn!(error = %error, "pipeline failed");
            events.send(Event::Pipeline(PipelineEvent::Error {
                message: error.to_string(),
            }));
            return Err(error);
        }

        info!(items_out, duration_ms, "pipeline completed");
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: PipelineSummary {
                stages: total,
                items_out,
                duration_ms,
            },
        }));

        Ok(Execution {
            output: PipelineOutput {
                items,
                stages,
                duration_ms,
            },
            items_out,
        })
    }
}

/// What happens to the items coming out of the last stage
#[derive(Debug, Clone, Copy)]
enum Sink {
    Collect,
    Discard,
}

struct Execution {
    output: PipelineOutput,
    items_out: usize,
}

/// Run `stages` as one pipeline and discard whatever the last stage emits.
pub fn execute_pipeline(stages: Vec<Box<dyn Stage>>) -> Result<(), PipelineError> {
    stages
        .into_iter()
        .fold(Pipeline::builder(), PipelineBuilder::boxed_stage)
        .build()
        .drain()
        .map(|_| ())
}

struct StageOutcome {
    index: usize,
    name: String,
    items_emitted: usize,
    result: Result<(), StageError>,
}

fn run_stage(
    index: usize,
    stage: &dyn Stage,
    input: ItemReceiver,
    output: ItemSender,
    events: &EventSender,
) -> StageOutcome {
    let name = stage.name().to_string();
    let sent = output.sent_counter();

    debug!(index, stage = %name, "stage started");
    events.send(Event::Stage(StageEvent::Started {
        index,
        name: name.clone(),
    }));

    // input and output move into the closure so they are dropped even on unwind
    let result = panic::catch_unwind(AssertUnwindSafe(move || stage.run(input, output)))
        .unwrap_or_else(|payload| {
            Err(StageError::Panicked {
                stage: name.clone(),
                message: panic_message(payload.as_ref()),
            })
        });

    let items_emitted = sent.load(Ordering::Relaxed);
    match &result {
        Ok(()) => {
            debug!(index, stage = %name, items_emitted, "stage finished");
            events.send(Event::Stage(StageEvent::Finished {
                index,
                name: name.clone(),
                items_emitted,
            }));
        }
        Err(e) => {
            warn!(index, stage = %name, error = %e, "stage failed");
            events.send(Event::Stage(StageEvent::Failed {
                index,
                name: name.clone(),
                message: e.to_string(),
            }));
        }
    }

    StageOutcome {
        index,
        name,
        items_emitted,
        result,
    }
}

/// Pick the failure that started the unwind: the first one that is not just
/// a reaction to a closed downstream stream. If every failure is of that
/// kind, a later stage simply stopped reading early and the run is fine.
fn root_cause(outcomes: Vec<StageOutcome>) -> Option<PipelineError> {
    outcomes.into_iter().find_map(|outcome| match outcome.result {
        Err(source) if !source.is_downstream_closed() => Some(PipelineError::Stage {
            index: outcome.index,
            name: outcome.name,
            source,
        }),
        _ => None,
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventChannel;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Arc;
    use std::time::Duration;

    fn numbers(values: Vec<i64>) -> impl Stage {
        stage_fn("numbers", move |_input, output| {
            for value in &values {
                output.send(*value)?;
            }
            Ok(())
        })
    }

    fn doubler() -> impl Stage {
        stage_fn("double", |input, output| {
            for item in input {
                match item {
                    Item::Number(n) => output.send(n * 2)?,
                    other => output.send(other)?,
                }
            }
            Ok(())
        })
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        let pipeline = Pipeline::builder().build();
        assert!(pipeline.is_empty());
        assert!(matches!(pipeline.run(), Err(PipelineError::NoStages)));
    }

    #[test]
    fn items_reach_the_caller_in_order_through_single_threaded_stages() {
        let pipeline = Pipeline::builder()
            .stage(numbers(vec![1, 2, 3]))
            .stage(doubler())
            .build();

        let output = pipeline.run().unwrap();

        assert_eq!(
            output.items,
            vec![Item::Number(2), Item::Number(4), Item::Number(6)]
        );
        assert_eq!(output.stages.len(), 2);
        assert_eq!(output.stages[0].items_emitted, 3);
        assert_eq!(output.stages[1].name, "double");
    }

    #[test]
    fn first_stage_sees_a_closed_input() {
        let saw_nothing = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&saw_nothing);

        let pipeline = Pipeline::builder()
            .stage(stage_fn("probe", move |input, _output| {
                flag.store(input.recv().is_none(), Ordering::SeqCst);
                Ok(())
            }))
            .build();

        let output = pipeline.run().unwrap();
        assert!(output.items.is_empty());
        assert!(saw_nothing.load(Ordering::SeqCst));
    }

    #[test]
    fn downstream_receives_before_upstream_returns() {
        let received = Arc::new(AtomicUsize::new(0));
        let flowed = Arc::new(AtomicBool::new(false));

        let seen = Arc::clone(&received);
        let ok = Arc::clone(&flowed);
        let counter = Arc::clone(&received);

        let pipeline = Pipeline::builder()
            .stage(stage_fn("producer", move |_input, output| {
                output.send(1_i64)?;
                thread::sleep(Duration::from_millis(10));
                ok.store(seen.load(Ordering::SeqCst) > 0, Ordering::SeqCst);
                Ok(())
            }))
            .stage(stage_fn("counter", move |input, _output| {
                for _ in input {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }))
            .build();

        pipeline.run().unwrap();
        assert!(flowed.load(Ordering::SeqCst));
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_stage_unwinds_an_unbounded_source() {
        let pipeline = Pipeline::builder()
            .stage(stage_fn("forever", |_input, output| {
                for n in 0_i64.. {
                    output.send(n)?;
                }
                Ok(())
            }))
            .stage(stage_fn("picky", |input, _output| {
                let first = input.recv();
                Err(StageError::Failed {
                    stage: "picky".to_string(),
                    reason: format!("rejected {first:?}"),
                })
            }))
            .build();

        match pipeline.run() {
            Err(PipelineError::Stage { index, name, source }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "picky");
                assert!(!source.is_downstream_closed());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn panicking_stage_is_reported_and_closes_its_output() {
        let pipeline = Pipeline::builder()
            .stage(numbers(vec![1, 2]))
            .stage(stage_fn("explode", |input, output| {
                output.send("partial")?;
                let _ = input.recv();
                panic!("stage blew up");
            }))
            .stage(stage_fn("sink", |input, _output| {
                for _ in input {}
                Ok(())
            }))
            .build();

        match pipeline.run() {
            Err(PipelineError::Stage { index, source, .. }) => {
                assert_eq!(index, 1);
                match source {
                    StageError::Panicked { message, .. } => {
                        assert!(message.contains("stage blew up"))
                    }
                    other => panic!("unexpected source: {other:?}"),
                }
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn events_track_stage_lifecycle() {
        let (sender, receiver) = EventChannel::new();
        let pipeline = Pipeline::builder()
            .stage(numbers(vec![5]))
            .stage(doubler())
            .stream_capacity(4)
            .build();

        pipeline.run_with_events(&sender).unwrap();
        drop(sender);

        let events: Vec<Event> = receiver.iter().collect();
        let finished = events
            .iter()
            .filter(|e| matches!(e, Event::Stage(StageEvent::Finished { .. })))
            .count();
        assert_eq!(finished, 2);
        assert!(matches!(
            events.last(),
            Some(Event::Pipeline(PipelineEvent::Completed { summary })) if summary.items_out == 1
        ));
    }

    #[test]
    fn execute_pipeline_discards_trailing_items() {
        let stages: Vec<Box<dyn Stage>> = vec![Box::new(numbers(vec![1, 2])), Box::new(doubler())];
        assert!(execute_pipeline(stages).is_ok());
    }

    #[test]
    fn drain_counts_items_without_keeping_them() {
        let pipeline = Pipeline::builder()
            .stage(stage_fn("many", |_input, output| {
                for n in 0..10_000_i64 {
                    output.send(n)?;
                }
                Ok(())
            }))
            .build();

        assert_eq!(pipeline.drain().unwrap(), 10_000);
    }

    #[test]
    fn drain_still_reports_failures() {
        let pipeline = Pipeline::builder()
            .stage(stage_fn("broken", |_input, _output| {
                Err(StageError::Failed {
                    stage: "broken".to_string(),
                    reason: "nope".to_string(),
                })
            }))
            .build();

        assert!(matches!(pipeline.drain(), Err(PipelineError::Stage { .. })));
    }

    #[test]
    fn stopping_early_downstream_is_not_a_failure() {
        let pipeline = Pipeline::builder()
            .stage(stage_fn("forever", |_input, output| {
                for n in 0_i64.. {
                    output.send(n)?;
                }
                Ok(())
            }))
            .stage(stage_fn("first_only", |input, output| {
                if let Some(item) = input.recv() {
                    output.send(item)?;
                }
                Ok(())
            }))
            .build();

        let output = pipeline.run().unwrap();
        assert_eq!(output.items, vec![Item::Number(0)]);
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let text: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(text.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
    }
}
