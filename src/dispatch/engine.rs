//! Key state tracking, rule matching and command dispatch

use super::Launcher;
use crate::input::{ActiveKeySet, EventCode, InputEvent};
use crate::rules::{HandlerTable, RuleLoader};
use crate::watcher::{DumpOutput, EventListener};
use log::{error, info, trace, warn};
use std::collections::HashSet;

/// Listener that turns key transitions into command launches
pub struct DispatchEngine<L: Launcher> {
    active: ActiveKeySet,
    ignored: HashSet<EventCode>,
    handlers: HandlerTable,
    loader: Option<RuleLoader>,
    launcher: L,
    dump: bool,
    dump_out: DumpOutput,
}

impl<L: Launcher> DispatchEngine<L> {
    /// Engine with an empty handler table
    pub fn new(launcher: L) -> Self {
        Self {
            active: ActiveKeySet::new(),
            ignored: HashSet::new(),
            handlers: HandlerTable::new(),
            loader: None,
            launcher,
            dump: false,
            dump_out: DumpOutput::stdout(),
        }
    }

    /// Engine whose handlers come from `loader`.
    ///
    /// An unreadable rule path is logged and leaves the table empty; dump
    /// mode is still useful without rules.
    pub fn with_loader(launcher: L, loader: RuleLoader) -> Self {
        let mut engine = Self::new(launcher);
        match loader.load() {
            Ok(table) => engine.handlers = table,
            Err(e) => error!("{}", e),
        }
        engine.loader = Some(loader);
        engine
    }

    /// Exclude a code from state tracking and matching
    pub fn ignore(&mut self, code: EventCode) {
        self.ignored.insert(code);
    }

    pub fn set_dump(&mut self, dump: bool) {
        self.dump = dump;
    }

    /// Share the watcher's dump writer so launches interleave with events
    pub fn set_dump_output(&mut self, out: DumpOutput) {
        self.dump_out = out;
    }

    pub fn active_keys(&self) -> &ActiveKeySet {
        &self.active
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Take the current handler table out, leaving an empty one
    pub fn flush_handlers(&mut self) -> HandlerTable {
        std::mem::take(&mut self.handlers)
    }

    /// Replace the handler table in one step
    pub fn install_handlers(&mut self, table: HandlerTable) -> HandlerTable {
        std::mem::replace(&mut self.handlers, table)
    }

    /// Re-read the rules and swap them in.
    ///
    /// The new table is built completely before the old one is flushed; if
    /// the rule path can't be read the old table stays. Held keys survive.
    pub fn reload(&mut self) -> bool {
        let Some(loader) = &self.loader else {
            return false;
        };

        match loader.load() {
            Ok(table) => {
                let previous = self.flush_handlers();
                info!(
                    "Reloaded rules: {} -> {} handlers",
                    previous.len(),
                    table.len()
                );
                self.install_handlers(table);
                true
            }
            Err(e) => {
                error!("Reload failed, keeping {} handlers: {}", self.handlers.len(), e);
                false
            }
        }
    }

    /// Update key state with one event and launch every matching rule.
    ///
    /// Returns the number of commands launched.
    pub fn process(&mut self, event: &InputEvent) -> usize {
        if !event.class.is_tracked() {
            return 0;
        }

        let code = event.event_code();
        if self.ignored.contains(&code) {
            trace!("ignored {:?}", code);
            return 0;
        }

        self.active.apply(code, event.value);

        let mut launched = 0;
        for rule in self.handlers.rules_for(code) {
            if !rule.matches(event.value, &self.active) {
                continue;
            }
            if self.dump {
                self.dump_out.write_line(&format!("# {}", rule.command_line()));
            }
            match self.launcher.launch(rule.command()) {
                Ok(()) => launched += 1,
                Err(e) => warn!("{}", e),
            }
        }
        launched
    }
}

impl<L: Launcher> EventListener for DispatchEngine<L> {
    fn handle_event(&mut self, event: &InputEvent) {
        self.process(event);
    }

    fn reload(&mut self) {
        DispatchEngine::reload(self);
    }
}
