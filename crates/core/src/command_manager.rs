//! Bounded undo/redo log.
//!
//! A command is a pair of closures, `cmd` and `undo`, plus an optional `post`
//! hook run after either of them during replay. The log is linear: adding a
//! command drops whatever could still be redone. Commands of the same kind can
//! collapse into one entry so a continuous gesture yields a single undo step.
//!
//! Closures receive the context by `&mut` and never the manager itself, so
//! replaying a command cannot queue new ones.

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

pub type Action<C> = Box<dyn FnMut(&mut C)>;

/// One undoable action.
pub struct Command<C, K> {
    cmd: Action<C>,
    undo: Action<C>,
    post: Option<Action<C>>,
    kind: Option<K>,
}

impl<C, K> Command<C, K> {
    pub fn new(cmd: impl FnMut(&mut C) + 'static, undo: impl FnMut(&mut C) + 'static) -> Self {
        Self { cmd: Box::new(cmd), undo: Box::new(undo), post: None, kind: None }
    }

    /// Hook run after `cmd` or `undo` when the command is replayed.
    pub fn with_post(mut self, post: impl FnMut(&mut C) + 'static) -> Self {
        self.post = Some(Box::new(post));
        self
    }

    /// Kind used to coalesce consecutive commands. Commands without a kind
    /// never coalesce.
    pub fn with_kind(mut self, kind: K) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn kind(&self) -> Option<&K> {
        self.kind.as_ref()
    }
}

impl<C, K: fmt::Debug> fmt::Debug for Command<C, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("kind", &self.kind)
            .field("has_post", &self.post.is_some())
            .finish_non_exhaustive()
    }
}

/// How [`CommandManager::add`] treats a new command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Replace the entry at the cursor when it has the same kind
    pub overwrite_if_same_type: bool,
    /// When replacing, keep the replaced entry's `undo`
    pub keep_undo: bool,
    /// Run `cmd` right away
    pub must_exec: bool,
}

impl AddOptions {
    /// Run the command now and log it.
    pub fn exec() -> Self {
        Self { must_exec: true, ..Self::default() }
    }

    /// Log a command whose effect already happened.
    pub fn record() -> Self {
        Self::default()
    }

    /// Run now and fold into a same-kind entry at the cursor, keeping its undo.
    pub fn coalescing() -> Self {
        Self { overwrite_if_same_type: true, keep_undo: true, must_exec: true }
    }
}

pub const DEFAULT_CAPACITY: usize = 128;

/// Fixed-capacity undo/redo log over a context `C`, with coalescing keys `K`.
///
/// The cursor points at the last applied command; `None` means nothing can
/// be undone.
pub struct CommandManager<C, K> {
    commands: VecDeque<Command<C, K>>,
    position: Option<usize>,
    max_size: usize,
}

impl<C, K: PartialEq + fmt::Debug> CommandManager<C, K> {
    pub fn new(max_size: usize) -> Self {
        Self { commands: VecDeque::new(), position: None, max_size: max_size.max(1) }
    }

    pub fn add(&mut self, context: &mut C, mut command: Command<C, K>, options: AddOptions) {
        if options.must_exec {
            (command.cmd)(context);
        }

        let Some(position) = self.position else {
            debug!(kind = ?command.kind, "command log restarted");
            self.commands.clear();
            self.commands.push_back(command);
            self.position = Some(0);
            return;
        };

        if options.overwrite_if_same_type
            && command.kind.is_some()
            && self.commands[position].kind == command.kind
        {
            self.commands.truncate(position + 1);
            let previous = std::mem::replace(&mut self.commands[position], command);
            if options.keep_undo {
                self.commands[position].undo = previous.undo;
            }
            debug!(kind = ?self.commands[position].kind, "command coalesced");
            return;
        }

        let next = position + 1;
        if next == self.max_size {
            self.commands.pop_front();
        } else {
            self.position = Some(next);
            self.commands.truncate(next);
        }
        debug!(kind = ?command.kind, len = self.commands.len() + 1, "command added");
        self.commands.push_back(command);
    }

    /// Undo the command at the cursor. Returns `false` when there is nothing
    /// to undo.
    pub fn undo(&mut self, context: &mut C) -> bool {
        let Some(position) = self.position else {
            return false;
        };

        let command = &mut self.commands[position];
        (command.undo)(context);
        if let Some(post) = command.post.as_mut() {
            post(context);
        }
        self.position = position.checked_sub(1);
        debug!(position = self.position(), "undo");
        true
    }

    /// Redo the command after the cursor. Returns `false` when there is
    /// nothing to redo.
    pub fn redo(&mut self, context: &mut C) -> bool {
        let next = self.position.map_or(0, |position| position + 1);
        let Some(command) = self.commands.get_mut(next) else {
            return false;
        };

        (command.cmd)(context);
        if let Some(post) = command.post.as_mut() {
            post(context);
        }
        self.position = Some(next);
        debug!(position = self.position(), "redo");
        true
    }

    pub fn has_something_to_undo(&self) -> bool {
        self.position.is_some()
    }

    pub fn has_something_to_redo(&self) -> bool {
        self.position.map_or(0, |position| position + 1) < self.commands.len()
    }

    /// Stop the entry at the cursor from absorbing further commands of `kind`.
    pub fn stop_coalescing(&mut self, kind: &K) {
        if let Some(position) = self.position {
            let command = &mut self.commands[position];
            if command.kind.as_ref() == Some(kind) {
                command.kind = None;
            }
        }
    }

    /// Cursor in `[-1, len)`.
    pub fn position(&self) -> isize {
        self.position.map_or(-1, |position| position as isize)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.position = None;
    }
}

impl<C, K: PartialEq + fmt::Debug> Default for CommandManager<C, K> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<C, K: fmt::Debug> fmt::Debug for CommandManager<C, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandManager")
            .field("commands", &self.commands)
            .field("position", &self.position)
            .field("max_size", &self.max_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adder(amount: i32, kind: u32) -> Command<i32, u32> {
        Command::new(move |x: &mut i32| *x += amount, move |x: &mut i32| *x -= amount)
            .with_kind(kind)
    }

    #[test]
    fn undo_redo_walks_the_log_exactly() {
        let mut manager = CommandManager::new(128);
        let mut x = 0;

        manager.add(&mut x, adder(1, 1), AddOptions::exec());
        manager.add(&mut x, adder(2, 2), AddOptions::exec());
        manager.add(&mut x, adder(3, 3), AddOptions::exec());
        assert_eq!(x, 6);

        for _ in 0..3 {
            assert!(manager.undo(&mut x));
        }
        assert_eq!(x, 0);
        assert!(!manager.undo(&mut x));
        assert_eq!(x, 0);

        for _ in 0..3 {
            assert!(manager.redo(&mut x));
        }
        assert!(!manager.redo(&mut x));
        assert_eq!(x, 6);
    }

    #[test]
    fn capacity_three_drops_the_oldest_entry() {
        let mut manager = CommandManager::new(3);
        let mut x = 0;

        manager.add(&mut x, adder(1, 1), AddOptions::exec());
        manager.add(&mut x, adder(2, 2), AddOptions::exec());
        manager.add(&mut x, adder(3, 3), AddOptions::exec());
        manager.add(&mut x, adder(4, 4), AddOptions::exec());
        assert_eq!(x, 10);
        assert_eq!(manager.len(), 3);

        manager.undo(&mut x);
        manager.undo(&mut x);
        assert_eq!(x, 3);

        manager.undo(&mut x);
        assert_eq!(x, 1);

        manager.undo(&mut x);
        assert_eq!(x, 1);

        manager.redo(&mut x);
        manager.redo(&mut x);
        assert_eq!(x, 6);

        manager.add(&mut x, adder(5, 5), AddOptions::exec());
        assert_eq!(x, 11);
    }

    #[test]
    fn capacity_four_keeps_everything_replayable() {
        let mut manager = CommandManager::new(4);
        let mut x = 0;

        manager.add(&mut x, adder(1, 1), AddOptions::exec());
        manager.add(&mut x, adder(2, 2), AddOptions::exec());
        manager.add(&mut x, adder(3, 3), AddOptions::exec());
        assert_eq!(x, 6);

        manager.undo(&mut x);
        assert_eq!(x, 3);
        manager.undo(&mut x);
        assert_eq!(x, 1);
        manager.undo(&mut x);
        assert_eq!(x, 0);
        manager.undo(&mut x);
        assert_eq!(x, 0);

        manager.redo(&mut x);
        manager.redo(&mut x);
        manager.redo(&mut x);
        assert_eq!(x, 6);
    }

    #[test]
    fn coalescing_keeps_first_undo_and_last_cmd() {
        let mut manager: CommandManager<Vec<&str>, u32> = CommandManager::new(8);
        let mut log = Vec::new();

        manager.add(
            &mut log,
            Command::new(|log: &mut Vec<&str>| log.push("cmd1"), |log| log.push("undo1"))
                .with_kind(7),
            AddOptions::coalescing(),
        );
        manager.add(
            &mut log,
            Command::new(|log: &mut Vec<&str>| log.push("cmd2"), |log| log.push("undo2"))
                .with_kind(7),
            AddOptions::coalescing(),
        );
        assert_eq!(manager.len(), 1);

        log.clear();
        manager.undo(&mut log);
        manager.redo(&mut log);
        assert_eq!(log, vec!["undo1", "cmd2"]);
    }

    #[test]
    fn overwrite_without_keep_undo_replaces_undo_too() {
        let mut manager: CommandManager<Vec<&str>, u32> = CommandManager::new(8);
        let mut log = Vec::new();
        let options = AddOptions { overwrite_if_same_type: true, ..AddOptions::default() };

        manager.add(
            &mut log,
            Command::new(|log: &mut Vec<&str>| log.push("cmd1"), |log| log.push("undo1"))
                .with_kind(1),
            options,
        );
        manager.add(
            &mut log,
            Command::new(|log: &mut Vec<&str>| log.push("cmd2"), |log| log.push("undo2"))
                .with_kind(1),
            options,
        );

        manager.undo(&mut log);
        assert_eq!(log, vec!["undo2"]);
    }

    #[test]
    fn commands_without_kind_never_coalesce() {
        let mut manager: CommandManager<i32, u32> = CommandManager::new(8);
        let mut x = 0;

        manager.add(&mut x, Command::new(|x| *x += 1, |x| *x -= 1), AddOptions::coalescing());
        manager.add(&mut x, Command::new(|x| *x += 1, |x| *x -= 1), AddOptions::coalescing());
        assert_eq!(manager.len(), 2);
        assert_eq!(x, 2);
    }

    #[test]
    fn adding_discards_the_redo_tail() {
        let mut manager = CommandManager::new(8);
        let mut x = 0;

        manager.add(&mut x, adder(1, 1), AddOptions::exec());
        manager.add(&mut x, adder(10, 2), AddOptions::exec());
        manager.undo(&mut x);
        assert!(manager.has_something_to_redo());

        manager.add(&mut x, adder(100, 3), AddOptions::exec());
        assert!(!manager.has_something_to_redo());
        assert_eq!(manager.len(), 2);
        assert_eq!(x, 101);

        manager.undo(&mut x);
        manager.undo(&mut x);
        manager.add(&mut x, adder(5, 4), AddOptions::exec());
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.position(), 0);
        assert_eq!(x, 5);
    }

    #[test]
    fn post_runs_after_undo_and_redo_only() {
        let mut manager: CommandManager<Vec<&str>, u32> = CommandManager::new(8);
        let mut log = Vec::new();

        manager.add(
            &mut log,
            Command::new(|log: &mut Vec<&str>| log.push("cmd"), |log| log.push("undo"))
                .with_post(|log| log.push("post")),
            AddOptions::exec(),
        );
        assert_eq!(log, vec!["cmd"]);

        manager.undo(&mut log);
        manager.redo(&mut log);
        assert_eq!(log, vec!["cmd", "undo", "post", "cmd", "post"]);
    }

    #[test]
    fn record_does_not_run_the_command() {
        let mut manager = CommandManager::new(8);
        let mut x = 5;

        manager.add(&mut x, adder(1, 1), AddOptions::record());
        assert_eq!(x, 5);
        manager.undo(&mut x);
        assert_eq!(x, 4);
    }

    #[test]
    fn stop_coalescing_closes_the_gesture() {
        let mut manager = CommandManager::new(8);
        let mut x = 0;

        manager.add(&mut x, adder(1, 9), AddOptions::coalescing());
        manager.stop_coalescing(&9);
        manager.add(&mut x, adder(1, 9), AddOptions::coalescing());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn position_stays_within_bounds() {
        let mut manager = CommandManager::new(2);
        let mut x = 0;
        assert_eq!(manager.position(), -1);
        assert!(!manager.has_something_to_undo());

        for amount in 1..=5 {
            manager.add(&mut x, adder(amount, amount as u32), AddOptions::exec());
            assert!(manager.position() < manager.len() as isize);
        }
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.capacity(), 2);

        manager.clear();
        assert!(manager.is_empty());
        assert_eq!(manager.position(), -1);
    }
}
