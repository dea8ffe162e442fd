use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::dom::dom_model::{DispatchedEvent, Dom, NodeId};
use crate::error::SessionError;
use crate::page::driver::{LoadSignal, PageDriver, PageFactory, SyntheticEvent, TargetRef};

// ============================================================================
// In-memory page driver (for testing and offline replay)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MockAction {
    Dispatched { node: NodeId, events: Vec<String> },
    ValueSet { node: NodeId, value: String },
}

/// Shared record of everything the mock pages saw.
#[derive(Debug, Default)]
pub struct MockLog {
    pub opened: Vec<String>,
    pub closed: usize,
    pub snapshots: usize,
    pub actions: Vec<MockAction>,
    /// Final document of every closed page, in close order.
    pub closed_pages: Vec<Dom>,
}

impl MockLog {
    /// Pages opened but not yet closed.
    pub fn open_pages(&self) -> usize {
        self.opened.len() - self.closed
    }

    pub fn values_set(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                MockAction::ValueSet { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Opens a fresh copy of one template document per page.
pub struct MockPageFactory {
    template: Dom,
    load: LoadSignal,
    load_times_out: bool,
    refuse_open: bool,
    throwing_ids: Vec<String>,
    stale_ids: Vec<String>,
    log: Rc<RefCell<MockLog>>,
}

impl MockPageFactory {
    pub fn new(template: Dom) -> Self {
        Self {
            template,
            load: LoadSignal::Loaded,
            load_times_out: false,
            refuse_open: false,
            throwing_ids: Vec::new(),
            stale_ids: Vec::new(),
            log: Rc::new(RefCell::new(MockLog::default())),
        }
    }

    pub fn with_load_signal(mut self, load: LoadSignal) -> Self {
        self.load = load;
        self
    }

    /// Pages open but never report load completion.
    pub fn timing_out_on_load(mut self) -> Self {
        self.load_times_out = true;
        self
    }

    /// Every `open_page` call fails.
    pub fn refusing_open(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    /// Actions on the element with this `id` attribute throw.
    pub fn throwing_on(mut self, element_id: &str) -> Self {
        self.throwing_ids.push(element_id.to_string());
        self
    }

    /// The element with this `id` attribute is detached right after each snapshot.
    pub fn stale_after_snapshot(mut self, element_id: &str) -> Self {
        self.stale_ids.push(element_id.to_string());
        self
    }

    pub fn log(&self) -> Rc<RefCell<MockLog>> {
        Rc::clone(&self.log)
    }
}

impl PageFactory for MockPageFactory {
    fn open_page(&mut self, url: &str) -> Result<Box<dyn PageDriver + '_>, SessionError> {
        if self.refuse_open {
            return Err(SessionError::Protocol {
                command: "open".into(),
                error: format!("refused to open {}", url),
            });
        }
        self.log.borrow_mut().opened.push(url.to_string());
        Ok(Box::new(MockPage {
            dom: self.template.clone(),
            load: self.load,
            load_times_out: self.load_times_out,
            throwing_ids: self.throwing_ids.clone(),
            stale_ids: self.stale_ids.clone(),
            log: Rc::clone(&self.log),
            closed: false,
        }))
    }
}

pub struct MockPage {
    dom: Dom,
    load: LoadSignal,
    load_times_out: bool,
    throwing_ids: Vec<String>,
    stale_ids: Vec<String>,
    log: Rc<RefCell<MockLog>>,
    closed: bool,
}

impl MockPage {
    fn live_node(&self, target: &TargetRef) -> Result<NodeId, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let node = match &target.handle {
            Some(h) => self
                .dom
                .find_by_handle(h)
                .ok_or_else(|| SessionError::StaleElement(h.clone()))?,
            None => target.node,
        };
        if self.dom.element(node).is_none() || !self.dom.is_connected(node) {
            return Err(SessionError::StaleElement(format!("node {}", node.0)));
        }
        if let Some(id) = self.dom.attr(node, "id") {
            if self.throwing_ids.iter().any(|t| t == id) {
                return Err(SessionError::Script(format!("handler on #{} threw", id)));
            }
        }
        Ok(node)
    }
}

impl PageDriver for MockPage {
    fn wait_for_load(&mut self, timeout: Duration) -> Result<LoadSignal, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.load_times_out {
            return Err(SessionError::Timeout {
                command: "wait_load".into(),
                request_id: "load".into(),
                waited_ms: timeout.as_millis() as u64,
            });
        }
        Ok(self.load)
    }

    fn snapshot(&mut self) -> Result<Dom, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.log.borrow_mut().snapshots += 1;
        let snapshot = self.dom.clone();

        for id in &self.stale_ids {
            let root = self.dom.root();
            if let Some(node) = self.dom.element_by_id(root, id) {
                self.dom.remove(node);
            }
        }
        Ok(snapshot)
    }

    fn dispatch(&mut self, target: &TargetRef, events: &[SyntheticEvent]) -> Result<(), SessionError> {
        let node = self.live_node(target)?;
        for ev in events {
            self.dom.record_event(
                node,
                DispatchedEvent {
                    kind: ev.kind.clone(),
                    key: ev.key.clone(),
                    bubbles: ev.bubbles,
                },
            );
        }
        self.log.borrow_mut().actions.push(MockAction::Dispatched {
            node,
            events: events.iter().map(|e| e.kind.clone()).collect(),
        });
        Ok(())
    }

    fn set_native_value(&mut self, target: &TargetRef, value: &str) -> Result<(), SessionError> {
        let node = self.live_node(target)?;
        self.dom.set_value(node, value);
        self.log.borrow_mut().actions.push(MockAction::ValueSet {
            node,
            value: value.to_string(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        if !self.closed {
            self.closed = true;
            let mut log = self.log.borrow_mut();
            log.closed += 1;
            log.closed_pages.push(self.dom.clone());
        }
        Ok(())
    }
}
