//! The task queue driving all component execution.
//!
//! Every wire delivery becomes a task. The scheduler drains the queue in
//! ticks: the set of tasks present when the tick starts is processed, and
//! anything enqueued while processing waits for the next tick. A task whose
//! target is still executing is deferred back to the front of the queue, so
//! deliveries keep their arrival order; deferral is detection work, never
//! eviction, and a counter per task surfaces starvation in the log.

use std::collections::VecDeque;

use super::component_state::InputData;

/// A pending delivery of one value to one component input.
#[derive(Debug)]
pub struct QueueTask {
    pub flow: String,
    pub component: String,
    pub input: String,
    pub data: InputData,
    /// The wire that produced this task, when one did. Start tasks and
    /// host-forwarded deliveries carry none.
    pub wire: Option<String>,
    /// Ticks this task has been deferred because its target was busy.
    pub defer_cycles: u32,
}

#[derive(Debug)]
pub struct TaskQueue {
    tasks: VecDeque<QueueTask>,
    /// Defer count at which a task is reported as starving.
    starvation_after: u32,
}

impl TaskQueue {
    pub fn new(starvation_after: u32) -> Self {
        Self {
            tasks: VecDeque::new(),
            starvation_after,
        }
    }

    /// Append a delivery at the back of the queue.
    pub fn push(
        &mut self,
        flow: impl Into<String>,
        component: impl Into<String>,
        input: impl Into<String>,
        data: InputData,
        wire: Option<String>,
    ) {
        self.tasks.push_back(QueueTask {
            flow: flow.into(),
            component: component.into(),
            input: input.into(),
            data,
            wire,
            defer_cycles: 0,
        });
    }

    /// Take every task currently queued. Tasks enqueued while the caller
    /// processes the returned batch land in the next tick.
    pub fn drain_tick(&mut self) -> Vec<QueueTask> {
        self.tasks.drain(..).collect()
    }

    /// Put deferred tasks back at the front, keeping their relative order
    /// ahead of anything enqueued during the tick.
    pub fn requeue_front(&mut self, deferred: Vec<QueueTask>) {
        for mut task in deferred.into_iter().rev() {
            task.defer_cycles += 1;
            if task.defer_cycles == self.starvation_after {
                tracing::warn!(
                    flow = %task.flow,
                    component = %task.component,
                    input = %task.input,
                    cycles = task.defer_cycles,
                    "queue task starving behind a long-running component"
                );
            }
            self.tasks.push_front(task);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_names(tasks: &VecDeque<QueueTask>) -> Vec<&str> {
        tasks.iter().map(|t| t.component.as_str()).collect()
    }

    #[test]
    fn drains_in_fifo_order() {
        let mut queue = TaskQueue::new(8);
        queue.push("f", "a", "@seqin", InputData::null(), None);
        queue.push("f", "b", "@seqin", InputData::null(), None);
        let batch = queue.drain_tick();
        let order: Vec<&str> = batch.iter().map(|t| t.component.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn tasks_enqueued_during_a_tick_wait_for_the_next() {
        let mut queue = TaskQueue::new(8);
        queue.push("f", "a", "@seqin", InputData::null(), None);
        let batch = queue.drain_tick();
        assert_eq!(batch.len(), 1);

        // Processing "a" produces a follow-up delivery.
        queue.push("f", "b", "@seqin", InputData::new(json!(1)), None);
        assert_eq!(queue.len(), 1);
        let next = queue.drain_tick();
        assert_eq!(next[0].component, "b");
    }

    #[test]
    fn deferred_tasks_return_to_the_front_in_order() {
        let mut queue = TaskQueue::new(8);
        queue.push("f", "a", "@seqin", InputData::null(), None);
        queue.push("f", "b", "@seqin", InputData::null(), None);
        let deferred = queue.drain_tick();

        // A new delivery arrives while both targets are busy.
        queue.push("f", "c", "@seqin", InputData::null(), None);
        queue.requeue_front(deferred);

        assert_eq!(task_names(&queue.tasks), vec!["a", "b", "c"]);
        assert!(queue.tasks[0].defer_cycles == 1 && queue.tasks[1].defer_cycles == 1);
        assert_eq!(queue.tasks[2].defer_cycles, 0);
    }

    #[test]
    fn defer_cycles_accumulate_without_dropping_the_task() {
        let mut queue = TaskQueue::new(2);
        queue.push("f", "a", "@seqin", InputData::null(), None);
        for _ in 0..5 {
            let deferred = queue.drain_tick();
            queue.requeue_front(deferred);
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.tasks[0].defer_cycles, 5);
    }
}
