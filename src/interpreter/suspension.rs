//! Driving suspended computations: generator objects, deferred results and
//! the FIFO job queue async functions continue from.

use super::frames::{Coroutine, Outcome, Resume};
use super::*;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Backing state of a generator object. `coroutine` is taken out while the
/// body runs, which is how re-entrant stepping is detected.
pub struct GeneratorState {
    pub(crate) coroutine: Option<Box<Coroutine>>,
    pub done: bool,
    pub is_async: bool,
    /// Pending `next`/`throw`/`return` requests of an async generator.
    pub(crate) requests: VecDeque<(Resume, JsObject)>,
    /// An async generator is between resumptions, waiting on an `await`.
    pub(crate) busy: bool,
}

#[derive(Debug, Clone)]
pub enum Settlement {
    Pending,
    Fulfilled(JsValue),
    Rejected(JsValue),
}

pub struct DeferredState {
    pub settlement: Settlement,
    pub(crate) reactions: Vec<Reaction>,
}

impl DeferredState {
    pub fn is_pending(&self) -> bool {
        matches!(self.settlement, Settlement::Pending)
    }
}

pub(crate) struct AsyncTask {
    coroutine: Option<Box<Coroutine>>,
    deferred: JsObject,
}

/// Something suspended on an `await`.
#[derive(Clone)]
pub(crate) enum Task {
    Function(Rc<RefCell<AsyncTask>>),
    Generator(JsObject),
}

/// Subscriber of a deferred result.
pub(crate) enum Reaction {
    Resume(Task),
    Then {
        on_fulfilled: JsValue,
        on_rejected: JsValue,
        result: JsObject,
    },
    /// Settle another deferred the same way.
    Forward(JsObject),
}

pub(crate) enum Job {
    Resume(Task, Resume),
    React(Reaction, Result<JsValue, JsValue>),
}

impl Interpreter {
    fn generator_state(&mut self, object: &JsObject) -> EvalResult<Rc<RefCell<GeneratorState>>> {
        if let ObjectKind::Generator(state) = &object.borrow().kind {
            return Ok(state.clone());
        }
        Err(self.type_error("not a generator object"))
    }

    pub(crate) fn create_generator_object(&mut self, co: Coroutine, function: &JsObject, is_async: bool) -> JsObject {
        let fallback = if is_async {
            &self.intrinsics.async_generator_prototype
        } else {
            &self.intrinsics.generator_prototype
        };
        let prototype = match function.borrow().get_own_value("prototype") {
            Some(JsValue::Object(p)) => p,
            _ => fallback.clone(),
        };
        let name = function.borrow().function().map(|f| f.name().to_string()).unwrap_or_default();
        debug!(function = %name, is_async, "generator created");
        let state = GeneratorState {
            coroutine: Some(Box::new(co)),
            done: false,
            is_async,
            requests: VecDeque::new(),
            busy: false,
        };
        JsObject::new(ObjectData::new(
            Some(prototype),
            ObjectKind::Generator(Rc::new(RefCell::new(state))),
        ))
    }

    /// Steps a synchronous generator; returns the produced value and whether
    /// the generator is now done.
    pub(crate) fn generator_resume(&mut self, object: &JsObject, resume: Resume) -> EvalResult<(JsValue, bool)> {
        let state = self.generator_state(object)?;
        if state.borrow().done {
            return match resume {
                Resume::Next(_) => Err(EvalError::suspension("generator has already completed")),
                Resume::Return(v) => Ok((v, true)),
                Resume::Throw(e) => Err(EvalError::Thrown(e)),
            };
        }
        let Some(mut co) = state.borrow_mut().coroutine.take() else {
            return Err(self.type_error("Generator is already running"));
        };
        debug!("generator resumed");
        self.enter_call()?;
        let outcome = self.resume(&mut co, resume);
        self.exit_call();
        match outcome {
            Ok(Outcome::Yield(v)) => {
                state.borrow_mut().coroutine = Some(co);
                Ok((v, false))
            }
            Ok(Outcome::Complete(v)) => {
                state.borrow_mut().done = true;
                debug!("generator finished");
                Ok((v, true))
            }
            Ok(Outcome::Threw(e)) => {
                state.borrow_mut().done = true;
                debug!("generator finished by throwing");
                Err(EvalError::Thrown(e))
            }
            Ok(Outcome::Await(_)) => {
                state.borrow_mut().done = true;
                Err(EvalError::suspension("await is only valid in async functions"))
            }
            Err(e) => {
                state.borrow_mut().done = true;
                Err(EvalError::Fatal(e))
            }
        }
    }

    /// `next`/`throw`/`return` on a generator object, as seen by guest code.
    pub(crate) fn generator_method(&mut self, this: &JsValue, resume: Resume) -> EvalResult<JsValue> {
        let Some(object) = this.as_object().cloned() else {
            return Err(self.type_error("next method called on incompatible receiver"));
        };
        if self.generator_state(&object)?.borrow().is_async {
            return self.async_generator_enqueue(&object, resume);
        }
        let (value, done) = self.generator_resume(&object, resume)?;
        Ok(self.create_iter_result(value, done))
    }

    pub(crate) fn new_deferred(&self) -> JsObject {
        JsObject::new(ObjectData::new(
            Some(self.intrinsics.deferred_prototype.clone()),
            ObjectKind::Deferred(Rc::new(RefCell::new(DeferredState {
                settlement: Settlement::Pending,
                reactions: Vec::new(),
            }))),
        ))
    }

    pub(crate) fn deferred_state(value: &JsValue) -> Option<Rc<RefCell<DeferredState>>> {
        match value {
            JsValue::Object(o) => match &o.borrow().kind {
                ObjectKind::Deferred(state) => Some(state.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Settles `deferred` with `value`, adopting the outcome when `value` is
    /// itself a deferred result.
    pub(crate) fn resolve_deferred(&mut self, deferred: &JsObject, value: JsValue) {
        if let Some(inner) = Self::deferred_state(&value) {
            if let JsValue::Object(o) = &value
                && o.ptr_eq(deferred)
            {
                let error = self.make_error("TypeError", "Chaining cycle detected for deferred result");
                self.settle(deferred, Err(error));
                return;
            }
            let settlement = inner.borrow().settlement.clone();
            match settlement {
                Settlement::Pending => inner.borrow_mut().reactions.push(Reaction::Forward(deferred.clone())),
                Settlement::Fulfilled(v) => self.settle(deferred, Ok(v)),
                Settlement::Rejected(e) => self.settle(deferred, Err(e)),
            }
            return;
        }
        self.settle(deferred, Ok(value));
    }

    pub(crate) fn reject_deferred(&mut self, deferred: &JsObject, error: JsValue) {
        self.settle(deferred, Err(error));
    }

    fn settle(&mut self, deferred: &JsObject, outcome: Result<JsValue, JsValue>) {
        let Some(state) = Self::deferred_state(&JsValue::Object(deferred.clone())) else {
            return;
        };
        let reactions = {
            let mut state = state.borrow_mut();
            if !state.is_pending() {
                return;
            }
            state.settlement = match &outcome {
                Ok(v) => Settlement::Fulfilled(v.clone()),
                Err(e) => Settlement::Rejected(e.clone()),
            };
            std::mem::take(&mut state.reactions)
        };
        debug!(fulfilled = outcome.is_ok(), subscribers = reactions.len(), "deferred settled");
        for reaction in reactions {
            self.jobs.push_back(Job::React(reaction, outcome.clone()));
        }
    }

    /// Subscribes `reaction` to `deferred`, queueing it at once when already
    /// settled.
    fn subscribe(&mut self, state: &Rc<RefCell<DeferredState>>, reaction: Reaction) {
        let settlement = state.borrow().settlement.clone();
        match settlement {
            Settlement::Pending => state.borrow_mut().reactions.push(reaction),
            Settlement::Fulfilled(v) => self.jobs.push_back(Job::React(reaction, Ok(v))),
            Settlement::Rejected(e) => self.jobs.push_back(Job::React(reaction, Err(e))),
        }
    }

    pub(crate) fn deferred_then(&mut self, this: &JsValue, on_fulfilled: JsValue, on_rejected: JsValue) -> EvalResult<JsValue> {
        let Some(state) = Self::deferred_state(this) else {
            return Err(self.type_error("then called on a value that is not a deferred result"));
        };
        let result = self.new_deferred();
        self.subscribe(
            &state,
            Reaction::Then {
                on_fulfilled,
                on_rejected,
                result: result.clone(),
            },
        );
        Ok(JsValue::Object(result))
    }

    /// Runs an async function body until its first `await`, returning the
    /// deferred result of the call.
    pub(crate) fn start_async(&mut self, co: Coroutine) -> EvalResult<JsValue> {
        let deferred = self.new_deferred();
        let task = Rc::new(RefCell::new(AsyncTask {
            coroutine: Some(Box::new(co)),
            deferred: deferred.clone(),
        }));
        self.step_task(Task::Function(task), Resume::Next(JsValue::Undefined))?;
        Ok(JsValue::Object(deferred))
    }

    /// Suspends `task` on `value`: a pending deferred result gets a
    /// subscriber, anything else resumes the task from the next job.
    pub(crate) fn await_value(&mut self, value: JsValue, task: Task) {
        debug!("async task suspended on await");
        match Self::deferred_state(&value) {
            Some(state) => self.subscribe(&state, Reaction::Resume(task)),
            None => self.jobs.push_back(Job::Resume(task, Resume::Next(value))),
        }
    }

    fn step_task(&mut self, task: Task, resume: Resume) -> Result<(), EngineError> {
        match task {
            Task::Function(task) => {
                let Some(mut co) = task.borrow_mut().coroutine.take() else {
                    return Err(EngineError::SuspensionProtocol("async task resumed while running".into()));
                };
                let outcome = self.resume(&mut co, resume)?;
                let deferred = task.borrow().deferred.clone();
                match outcome {
                    Outcome::Await(v) => {
                        task.borrow_mut().coroutine = Some(co);
                        self.await_value(v, Task::Function(task));
                    }
                    Outcome::Complete(v) => self.resolve_deferred(&deferred, v),
                    Outcome::Threw(e) => self.reject_deferred(&deferred, e),
                    Outcome::Yield(_) => {
                        return Err(EngineError::SuspensionProtocol("yield outside of a generator".into()));
                    }
                }
                Ok(())
            }
            Task::Generator(object) => self.async_generator_step(&object, Some(resume)),
        }
    }

    pub(crate) fn async_generator_enqueue(&mut self, object: &JsObject, resume: Resume) -> EvalResult<JsValue> {
        let state = self.generator_state(object)?;
        let deferred = self.new_deferred();
        state.borrow_mut().requests.push_back((resume, deferred.clone()));
        if !state.borrow().busy {
            self.async_generator_step(object, None)?;
        }
        Ok(JsValue::Object(deferred))
    }

    /// Serves queued requests of an async generator until it has to wait.
    /// `resumed` carries the settlement of an `await` the body was parked on.
    fn async_generator_step(&mut self, object: &JsObject, mut resumed: Option<Resume>) -> Result<(), EngineError> {
        let state = match &object.borrow().kind {
            ObjectKind::Generator(state) => state.clone(),
            _ => return Err(EngineError::SuspensionProtocol("not an async generator".into())),
        };
        loop {
            let request = resumed.take().map(|r| (r, true)).or_else(|| {
                let s = state.borrow();
                s.requests.front().map(|(r, _)| (r.clone(), false))
            });
            let Some((resume, continuing)) = request else {
                return Ok(());
            };
            if !continuing && state.borrow().done {
                let Some((resume, deferred)) = state.borrow_mut().requests.pop_front() else {
                    return Ok(());
                };
                match resume {
                    Resume::Throw(e) => self.reject_deferred(&deferred, e),
                    Resume::Return(v) => {
                        let record = self.create_iter_result(v, true);
                        self.resolve_deferred(&deferred, record);
                    }
                    Resume::Next(_) => {
                        let record = self.create_iter_result(JsValue::Undefined, true);
                        self.resolve_deferred(&deferred, record);
                    }
                }
                continue;
            }
            let Some(mut co) = state.borrow_mut().coroutine.take() else {
                return Ok(());
            };
            state.borrow_mut().busy = true;
            let outcome = self.resume(&mut co, resume);
            let outcome = match outcome {
                Ok(o) => o,
                Err(e) => {
                    let mut s = state.borrow_mut();
                    s.done = true;
                    s.busy = false;
                    return Err(e);
                }
            };
            if let Outcome::Await(v) = outcome {
                state.borrow_mut().coroutine = Some(co);
                self.await_value(v, Task::Generator(object.clone()));
                return Ok(());
            }
            let front = {
                let mut s = state.borrow_mut();
                s.busy = false;
                match &outcome {
                    Outcome::Yield(_) => s.coroutine = Some(co),
                    _ => s.done = true,
                }
                s.requests.pop_front()
            };
            let Some((_, deferred)) = front else {
                continue;
            };
            match outcome {
                Outcome::Yield(v) => {
                    let record = self.create_iter_result(v, false);
                    self.resolve_deferred(&deferred, record);
                }
                Outcome::Complete(v) => {
                    debug!("async generator finished");
                    let record = self.create_iter_result(v, true);
                    self.resolve_deferred(&deferred, record);
                }
                Outcome::Threw(e) => self.reject_deferred(&deferred, e),
                Outcome::Await(_) => {}
            }
        }
    }

    fn run_reaction(&mut self, reaction: Reaction, outcome: Result<JsValue, JsValue>) -> Result<(), EngineError> {
        match reaction {
            Reaction::Resume(task) => {
                let resume = match outcome {
                    Ok(v) => Resume::Next(v),
                    Err(e) => Resume::Throw(e),
                };
                self.step_task(task, resume)
            }
            Reaction::Forward(target) => {
                self.settle(&target, outcome);
                Ok(())
            }
            Reaction::Then {
                on_fulfilled,
                on_rejected,
                result,
            } => {
                let (handler, argument, fulfilled) = match outcome {
                    Ok(v) => (on_fulfilled, v, true),
                    Err(e) => (on_rejected, e, false),
                };
                if !handler.is_callable() {
                    if fulfilled {
                        self.resolve_deferred(&result, argument);
                    } else {
                        self.reject_deferred(&result, argument);
                    }
                    return Ok(());
                }
                match self.call_function(&handler, JsValue::Undefined, &[argument]) {
                    Ok(v) => self.resolve_deferred(&result, v),
                    Err(EvalError::Thrown(e)) => self.reject_deferred(&result, e),
                    Err(EvalError::Fatal(e)) => return Err(e),
                }
                Ok(())
            }
        }
    }

    /// Drains the job queue in FIFO order, including jobs queued meanwhile.
    pub fn run_jobs(&mut self) -> Result<(), EngineError> {
        let mut drained = 0usize;
        while let Some(job) = self.jobs.pop_front() {
            drained += 1;
            match job {
                Job::Resume(task, resume) => self.step_task(task, resume)?,
                Job::React(reaction, outcome) => self.run_reaction(reaction, outcome)?,
            }
        }
        if drained > 0 {
            debug!(jobs = drained, "job queue drained");
        }
        Ok(())
    }

    /// Reports deferred results that ended rejected with nobody listening.
    pub(crate) fn warn_unhandled(&self, value: &JsValue) {
        if let Some(state) = Self::deferred_state(value)
            && let Settlement::Rejected(e) = &state.borrow().settlement
        {
            warn!(error = %e, "deferred result rejected without a handler");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fulfilled(value: &JsValue) -> Option<JsValue> {
        match Interpreter::deferred_state(value)?.borrow().settlement.clone() {
            Settlement::Fulfilled(v) => Some(v),
            _ => None,
        }
    }

    #[test]
    fn settlement_happens_once() {
        let mut interp = Interpreter::new();
        let d = interp.new_deferred();
        interp.resolve_deferred(&d, JsValue::from(1));
        interp.reject_deferred(&d, JsValue::from(2));
        let v = fulfilled(&JsValue::Object(d)).and_then(|v| v.as_number());
        assert_eq!(v, Some(1.0));
    }

    #[test]
    fn then_callbacks_run_from_the_job_queue() {
        let mut interp = Interpreter::new();
        let d = interp.new_deferred();
        let double = interp.native_function("double", 1, |interp, _, args| {
            let n = interp.to_number(args.first().unwrap_or(&JsValue::Undefined))?;
            Ok(JsValue::from(n * 2.0))
        });
        let chained = interp
            .deferred_then(&JsValue::Object(d.clone()), JsValue::Object(double), JsValue::Undefined)
            .unwrap();
        interp.resolve_deferred(&d, JsValue::from(21));
        assert!(fulfilled(&chained).is_none());
        interp.run_jobs().unwrap();
        assert_eq!(fulfilled(&chained).and_then(|v| v.as_number()), Some(42.0));
    }

    #[test]
    fn adopting_a_pending_deferred_waits_for_it() {
        let mut interp = Interpreter::new();
        let outer = interp.new_deferred();
        let inner = interp.new_deferred();
        interp.resolve_deferred(&outer, JsValue::Object(inner.clone()));
        assert!(fulfilled(&JsValue::Object(outer.clone())).is_none());
        interp.resolve_deferred(&inner, JsValue::from("done"));
        interp.run_jobs().unwrap();
        let v = fulfilled(&JsValue::Object(outer));
        assert_eq!(v.map(|v| v.to_string()), Some("done".to_string()));
    }
}
