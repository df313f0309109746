//! Edit session with a debounced autosave timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use story_model::{ModelResult, NodeId};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::NodeDraft;
use crate::error::{EngineResult, ValidationError};
use crate::store::Transition;
use crate::sync::SyncOrchestrator;

type SharedDraft = Arc<Mutex<Option<NodeDraft>>>;

/// Resolves with the remote outcome of a commit.
pub type CommitHandle = JoinHandle<EngineResult<()>>;

fn lock(draft: &SharedDraft) -> MutexGuard<'_, Option<NodeDraft>> {
    draft.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Commit a dirty draft: upsert locally, then write remotely on a detached task.
///
/// The draft lock is held until the store holds the committed node, so an
/// edit can never observe a clean draft the store has not caught up with.
fn commit_dirty(draft: &SharedDraft, orchestrator: &SyncOrchestrator) -> Option<CommitHandle> {
    let mut guard = lock(draft);
    let node = guard.as_mut().and_then(NodeDraft::take_for_commit)?;
    debug!(node_id = %node.id, "Committing draft");
    Some(orchestrator.commit_node(node))
}

/// An open editor: at most one draft and at most one pending autosave timer.
///
/// Every edit restarts the timer. When it fires after the idle window, the
/// dirty draft is committed through [`SyncOrchestrator::commit_node`]: the
/// store is updated at once and the remote write runs detached. Switching
/// focus or closing commits a dirty draft the same way without waiting on
/// the backend.
pub struct EditSession {
    orchestrator: SyncOrchestrator,
    idle: Duration,
    draft: SharedDraft,
    timer: Option<JoinHandle<()>>,
}

impl EditSession {
    /// Create a session using the configured idle window.
    pub fn new(orchestrator: SyncOrchestrator) -> Self {
        let idle = orchestrator.config().autosave_idle();
        Self {
            orchestrator,
            idle,
            draft: Arc::new(Mutex::new(None)),
            timer: None,
        }
    }

    /// Override the idle window.
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Id of the node being edited.
    pub fn current_id(&self) -> Option<NodeId> {
        lock(&self.draft).as_ref().map(|d| d.id().clone())
    }

    /// Copy of the open draft.
    pub fn draft(&self) -> Option<NodeDraft> {
        lock(&self.draft).clone()
    }

    /// The "unsaved changes" indicator.
    pub fn is_dirty(&self) -> bool {
        lock(&self.draft).as_ref().is_some_and(NodeDraft::is_dirty)
    }

    /// Whether an autosave is scheduled.
    pub fn has_pending_autosave(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Open `id` for editing, committing the current draft first.
    ///
    /// Returns the handle of that commit, if there was one. An unknown id
    /// leaves the old (now clean) draft open.
    pub fn focus(&mut self, id: &NodeId) -> EngineResult<Option<CommitHandle>> {
        let committed = self.flush();
        let node = self
            .orchestrator
            .store()
            .read(|s| s.node(id).cloned())
            .ok_or_else(|| ValidationError::UnknownNode(id.clone()))?;

        self.orchestrator.select_node(Some(id.clone()));
        *lock(&self.draft) = Some(NodeDraft::new(node));
        debug!(node_id = %id, "Draft opened");
        Ok(committed)
    }

    /// Commit and drop the draft.
    pub fn close(&mut self) -> Option<CommitHandle> {
        let committed = self.flush();
        *lock(&self.draft) = None;
        committed
    }

    /// Commit a dirty draft now and cancel the pending timer.
    ///
    /// The store is updated before this returns; the remote write is not
    /// awaited.
    pub fn flush(&mut self) -> Option<CommitHandle> {
        self.cancel_timer();
        commit_dirty(&self.draft, &self.orchestrator)
    }

    /// Replace a clean draft with the current authoritative node.
    ///
    /// A dirty draft is kept as it is. Returns whether the draft changed.
    pub fn refresh(&self) -> bool {
        let mut guard = lock(&self.draft);
        self.refresh_locked(&mut guard)
    }

    fn refresh_locked(&self, slot: &mut Option<NodeDraft>) -> bool {
        let Some(draft) = slot.as_mut() else {
            return false;
        };
        if draft.is_dirty() {
            return false;
        }

        let id = draft.id().clone();
        match self.orchestrator.store().read(|s| s.node(&id).cloned()) {
            Some(node) if draft.node() != &node => {
                *draft = NodeDraft::new(node);
                debug!(node_id = %id, "Clean draft refreshed");
                true
            }
            _ => false,
        }
    }

    /// Apply an edit to the open draft and restart the autosave timer.
    ///
    /// A clean draft is refreshed first, so a change made to the node
    /// elsewhere (an auto-link, say) is not overwritten by the commit. The
    /// timer restarts whenever the draft ends up dirty, even if `f` failed
    /// after changing it.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut NodeDraft) -> ModelResult<R>) -> EngineResult<R> {
        let (result, dirty) = {
            let mut guard = lock(&self.draft);
            self.refresh_locked(&mut guard);
            let draft = guard.as_mut().ok_or(ValidationError::NoOpenDraft)?;
            let result = f(draft);
            (result, draft.is_dirty())
        };

        if dirty {
            self.schedule();
        }
        Ok(result?)
    }

    /// Append an open choice labelled with the configured default text.
    pub fn add_choice(&mut self) -> EngineResult<usize> {
        let text = self.orchestrator.config().default_choice_text.clone();
        self.edit(|d| Ok(d.add_choice(text)))
    }

    /// Add a +1 adjustment for the first stat of the current catalog.
    pub fn add_adjustment(&mut self, choice: usize) -> EngineResult<usize> {
        let catalog = self.orchestrator.store().read(|s| s.custom_stats.clone());
        self.edit(|d| d.add_adjustment(choice, &catalog))
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn schedule(&mut self) {
        self.cancel_timer();

        let draft = Arc::clone(&self.draft);
        let orchestrator = self.orchestrator.clone();
        let idle = self.idle;

        // Aborting only ever lands on the sleep; the commit itself has no
        // await point and its remote write runs on its own task.
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if commit_dirty(&draft, &orchestrator).is_some() {
                debug!("Autosave fired");
            }
        }));
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.cancel_timer();
        if tokio::runtime::Handle::try_current().is_ok() {
            // The remote write keeps running after the session is gone.
            let _ = commit_dirty(&self.draft, &self.orchestrator);
            return;
        }

        let pending = lock(&self.draft).as_mut().and_then(NodeDraft::take_for_commit);
        if let Some(node) = pending {
            warn!(node_id = %node.id, "Session dropped outside a runtime; remote save skipped");
            self.orchestrator.store().dispatch(Transition::UpsertNode(node));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;
    use crate::config::EngineConfig;
    use crate::gateway::{GatewayOp, MemoryGateway, PersistenceGateway};
    use crate::EngineError;
    use story_model::{GameChoice, StoryNode};
    use tokio::time::Instant;

    async fn setup() -> (Arc<MemoryGateway>, SyncOrchestrator) {
        let gateway = Arc::new(MemoryGateway::new());
        let orchestrator = SyncOrchestrator::new(gateway.clone(), EngineConfig::default());
        orchestrator.set_user(Some(&User::new("ada")));

        let scope = orchestrator.scope().unwrap();
        let nodes = vec![
            StoryNode::new("a", "First", "")
                .with_choice(GameChoice::new("c", "Go").with_target("b")),
            StoryNode::new("b", "Second", ""),
        ];
        gateway.save_bulk(&scope, &nodes).await.unwrap();
        orchestrator.load_story().await.unwrap();
        (gateway, orchestrator)
    }

    fn saves(gateway: &MemoryGateway) -> usize {
        gateway.call_count(GatewayOp::SaveNode)
    }

    fn title(orchestrator: &SyncOrchestrator, id: &str) -> String {
        orchestrator.state().node(&NodeId::new(id)).unwrap().title.clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_stay_local_until_timer_fires() {
        let (gateway, orchestrator) = setup().await;
        let baseline = saves(&gateway);
        let mut session = EditSession::new(orchestrator.clone());
        session.focus(&NodeId::new("a")).unwrap();

        session
            .edit(|d| {
                d.set_title("Draft title");
                Ok(())
            })
            .unwrap();
        assert!(session.is_dirty());
        assert!(session.has_pending_autosave());
        assert_eq!(title(&orchestrator, "a"), "First");

        tokio::time::sleep(Duration::from_millis(1600)).await;

        assert_eq!(title(&orchestrator, "a"), "Draft title");
        assert_eq!(saves(&gateway), baseline + 1);
        assert!(!session.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_edit_restarts_the_timer() {
        let (gateway, orchestrator) = setup().await;
        let baseline = saves(&gateway);
        let mut session = EditSession::new(orchestrator.clone());
        session.focus(&NodeId::new("a")).unwrap();

        for text in ["T", "Th", "The"] {
            session
                .edit(|d| {
                    d.set_content(text);
                    Ok(())
                })
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1000)).await;
            assert_eq!(saves(&gateway), baseline);
        }

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(saves(&gateway), baseline + 1);
        assert_eq!(orchestrator.state().nodes[0].content, "The");
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_focus_does_not_wait_for_backend() {
        let (gateway, orchestrator) = setup().await;
        let baseline = saves(&gateway);
        gateway.set_latency(Duration::from_secs(5));

        let mut session = EditSession::new(orchestrator.clone());
        session.focus(&NodeId::new("a")).unwrap();
        session
            .edit(|d| {
                d.add_choice("Wait");
                Ok(())
            })
            .unwrap();

        let started = Instant::now();
        let pending = session.focus(&NodeId::new("b")).unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);

        let state = orchestrator.state();
        assert_eq!(state.nodes[0].choices.len(), 2);
        assert_eq!(state.selected_node_id, Some(NodeId::new("b")));
        assert_eq!(session.current_id(), Some(NodeId::new("b")));

        pending.unwrap().await.unwrap().unwrap();
        assert_eq!(saves(&gateway), baseline + 1);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(saves(&gateway), baseline + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosaved_edit_survives_a_follow_up_edit() {
        let (gateway, orchestrator) = setup().await;
        gateway.set_latency(Duration::from_secs(5));
        let mut session = EditSession::new(orchestrator.clone());
        session.focus(&NodeId::new("a")).unwrap();

        session
            .edit(|d| {
                d.set_title("One");
                Ok(())
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1600)).await;

        // The timer has committed; the remote write is still in flight.
        assert!(!session.is_dirty());
        assert_eq!(title(&orchestrator, "a"), "One");
        assert_eq!(orchestrator.state().pending_writes, 1);

        session
            .edit(|d| {
                d.set_content("Two");
                Ok(())
            })
            .unwrap();
        session.flush().unwrap().await.unwrap().unwrap();

        let a = orchestrator.state().node(&NodeId::new("a")).cloned().unwrap();
        assert_eq!(a.title, "One");
        assert_eq!(a.content, "Two");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_close_does_not_save() {
        let (gateway, orchestrator) = setup().await;
        let baseline = saves(&gateway);
        let mut session = EditSession::new(orchestrator);
        session.focus(&NodeId::new("b")).unwrap();

        assert!(session.close().is_none());
        assert_eq!(saves(&gateway), baseline);
        assert!(session.current_id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dirty_close_commits() {
        let (gateway, orchestrator) = setup().await;
        let mut session = EditSession::new(orchestrator.clone()).with_idle(Duration::from_secs(60));
        session.focus(&NodeId::new("b")).unwrap();
        session
            .edit(|d| {
                d.set_title("Closed");
                Ok(())
            })
            .unwrap();

        let pending = session.close().unwrap();
        assert_eq!(title(&orchestrator, "b"), "Closed");
        assert!(!session.has_pending_autosave());

        pending.await.unwrap().unwrap();
        let scope = orchestrator.scope().unwrap();
        assert_eq!(gateway.fetch_nodes(&scope).await.unwrap()[1].title, "Closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_a_dirty_session_commits() {
        let (gateway, orchestrator) = setup().await;
        let baseline = saves(&gateway);
        let mut session = EditSession::new(orchestrator.clone());
        session.focus(&NodeId::new("b")).unwrap();
        session
            .edit(|d| {
                d.set_title("Abandoned");
                Ok(())
            })
            .unwrap();

        drop(session);
        assert_eq!(title(&orchestrator, "b"), "Abandoned");

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(saves(&gateway), baseline + 1);
    }

    #[tokio::test]
    async fn test_edit_without_draft_or_bad_index() {
        let (_gateway, orchestrator) = setup().await;
        let mut session = EditSession::new(orchestrator);

        let missing = session.edit(|d| {
            d.set_title("x");
            Ok(())
        });
        assert!(matches!(
            missing,
            Err(EngineError::Validation(ValidationError::NoOpenDraft))
        ));

        session.focus(&NodeId::new("b")).unwrap();
        let bad = session.edit(|d| d.remove_choice(5));
        assert!(bad.is_err());
        assert!(!session.is_dirty());
        assert!(!session.has_pending_autosave());

        let unknown = session.focus(&NodeId::new("ghost"));
        assert!(matches!(
            unknown,
            Err(EngineError::Validation(ValidationError::UnknownNode(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_edit_that_changed_the_draft_still_autosaves() {
        let (_gateway, orchestrator) = setup().await;
        let mut session = EditSession::new(orchestrator.clone());
        session.focus(&NodeId::new("b")).unwrap();

        let result = session.edit(|d| {
            d.set_title("Half done");
            d.remove_choice(9)
        });
        assert!(result.is_err());
        assert!(session.is_dirty());
        assert!(session.has_pending_autosave());

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(title(&orchestrator, "b"), "Half done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_draft_picks_up_auto_link() {
        let (_gateway, orchestrator) = setup().await;
        let mut session = EditSession::new(orchestrator.clone());
        session.focus(&NodeId::new("b")).unwrap();
        session
            .edit(|d| {
                d.add_choice("Onward");
                Ok(())
            })
            .unwrap();
        session.flush().unwrap().await.unwrap().unwrap();

        let added = orchestrator.add_node(Some(&NodeId::new("b"))).await.unwrap();
        session
            .edit(|d| {
                d.set_title("Renamed");
                Ok(())
            })
            .unwrap();
        session.flush().unwrap().await.unwrap().unwrap();

        let b = orchestrator.state().node(&NodeId::new("b")).cloned().unwrap();
        assert_eq!(b.title, "Renamed");
        assert_eq!(b.choices[0].next_node_id, Some(added));
    }

    #[tokio::test(start_paused = true)]
    async fn test_adjustment_uses_catalog() {
        let (_gateway, orchestrator) = setup().await;
        orchestrator.load_stats().await.unwrap();
        let mut session = EditSession::new(orchestrator);
        session.focus(&NodeId::new("a")).unwrap();

        let index = session.add_adjustment(0).unwrap();
        let draft = session.draft().unwrap();
        assert_eq!(draft.node().choices[0].adjustments[index].stat_name, "discipline");

        let added = session.add_choice().unwrap();
        let draft = session.draft().unwrap();
        assert_eq!(draft.node().choices[added].text, "New Choice");
        assert!(draft.node().choices[added].is_terminal());
    }
}
