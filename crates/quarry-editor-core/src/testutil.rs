//! In-memory host implementation driving the core in tests: a block manager
//! with DOM-backed paragraph-like blocks, deterministic monospace metrics and
//! a manually advanced clock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use quarry_dom::metrics::LAYOUT_ROOT_ATTR;
use quarry_dom::{Dom, MonospaceMetrics, NodeId};
use serde_json::{json, Value};
use smol_str::SmolStr;
use web_time::{Duration, Instant};

use crate::events::EventBus;
use crate::host::{
    Block, BlockManager, CaretHelper, CaretPlacement, Clock, EditorCoordinator, EditorHost,
    EditorUi, InsertBlockRequest, ModificationsObserver, Renderer, ShortcutRegistrar,
};
use crate::keys::KeyCombo;
use crate::markers;
use crate::selection;
use crate::snapshot::SavedBlock;

pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            now: Cell::new(Instant::now()),
        })
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// A paragraph-like block: wrapper > content > contenteditable input > text.
pub struct MemoryBlock {
    dom: Rc<RefCell<Dom>>,
    id: SmolStr,
    tool: RefCell<SmolStr>,
    data: RefCell<Value>,
    tunes: RefCell<Option<Value>>,
    holder: NodeId,
    input: NodeId,
    selected: Cell<bool>,
    ready: Cell<bool>,
    pub save_fails: Cell<bool>,
    pub invalid: Cell<bool>,
    pub refuse_set_data: Cell<bool>,
}

impl MemoryBlock {
    pub fn text(&self) -> String {
        self.dom.borrow().text_content(self.input)
    }

    pub fn set_text(&self, text: &str) {
        let mut dom = self.dom.borrow_mut();
        if let Some(node) = dom.first_child(self.input) {
            let _ = dom.set_text(node, text);
        }
        drop(dom);
        *self.data.borrow_mut() = json!({ "text": text });
    }

    pub fn input_node(&self) -> NodeId {
        self.input
    }

    /// Swap the tool tag in place, modelling a structural conversion.
    pub fn set_tool(&self, tool: &str) {
        *self.tool.borrow_mut() = tool.into();
    }
}

impl Block for MemoryBlock {
    fn id(&self) -> SmolStr {
        self.id.clone()
    }

    fn tool(&self) -> SmolStr {
        self.tool.borrow().clone()
    }

    fn holder(&self) -> NodeId {
        self.holder
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn current_input(&self) -> Option<NodeId> {
        Some(self.input)
    }

    fn focusable(&self) -> bool {
        true
    }

    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn is_empty(&self) -> bool {
        self.text().is_empty()
    }

    fn selected(&self) -> bool {
        self.selected.get()
    }

    fn set_selected(&self, selected: bool) {
        self.selected.set(selected);
    }

    fn save(&self) -> Option<SavedBlock> {
        if self.save_fails.get() {
            return None;
        }
        let mut saved = SavedBlock::new(
            self.id.clone(),
            self.tool.borrow().clone(),
            self.data.borrow().clone(),
        );
        saved.tunes = self.tunes.borrow().clone();
        Some(saved)
    }

    fn validate(&self, _data: &Value) -> bool {
        !self.invalid.get()
    }

    fn set_data(&self, data: &Value) -> bool {
        if self.refuse_set_data.get() {
            return false;
        }
        *self.data.borrow_mut() = data.clone();
        let text = data
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut dom = self.dom.borrow_mut();
        if let Some(node) = dom.first_child(self.input) {
            let _ = dom.set_text(node, text);
        }
        true
    }
}

pub struct MemoryBlockManager {
    dom: Rc<RefCell<Dom>>,
    editor_root: NodeId,
    blocks: RefCell<Vec<Rc<MemoryBlock>>>,
    current: Cell<Option<usize>>,
    next_id: Cell<usize>,
}

impl MemoryBlockManager {
    fn make_block(
        &self,
        id: SmolStr,
        tool: SmolStr,
        data: Value,
        tunes: Option<Value>,
        index: usize,
    ) -> Rc<MemoryBlock> {
        let text = data
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut dom = self.dom.borrow_mut();
        let holder = dom.create_element("div");
        dom.set_attr(holder, markers::BLOCK_WRAPPER, "true");
        dom.set_attr(holder, markers::BLOCK_ID, id.clone());
        dom.set_attr(holder, LAYOUT_ROOT_ATTR, "true");
        let content = dom.create_element("div");
        dom.set_attr(content, markers::BLOCK, "true");
        let input = dom.create_element("div");
        dom.set_attr(input, markers::BLOCK_INPUT, "true");
        let text_node = dom.create_text(text);
        dom.insert_child_at(self.editor_root, holder, index).unwrap();
        dom.append_child(holder, content).unwrap();
        dom.append_child(content, input).unwrap();
        dom.append_child(input, text_node).unwrap();
        drop(dom);

        Rc::new(MemoryBlock {
            dom: self.dom.clone(),
            id,
            tool: RefCell::new(tool),
            data: RefCell::new(data),
            tunes: RefCell::new(tunes),
            holder,
            input,
            selected: Cell::new(false),
            ready: Cell::new(true),
            save_fails: Cell::new(false),
            invalid: Cell::new(false),
            refuse_set_data: Cell::new(false),
        })
    }

    pub fn block(&self, index: usize) -> Rc<MemoryBlock> {
        self.blocks.borrow()[index].clone()
    }

    pub fn block_with_id(&self, id: &str) -> Option<Rc<MemoryBlock>> {
        self.blocks.borrow().iter().find(|b| b.id == id).cloned()
    }

    pub fn set_current(&self, index: usize) {
        self.current.set(Some(index));
    }

    pub fn texts(&self) -> Vec<String> {
        self.blocks.borrow().iter().map(|b| b.text()).collect()
    }

    pub fn ids(&self) -> Vec<SmolStr> {
        self.blocks.borrow().iter().map(|b| b.id.clone()).collect()
    }

    pub fn selected_ids(&self) -> Vec<SmolStr> {
        self.blocks
            .borrow()
            .iter()
            .filter(|b| b.selected.get())
            .map(|b| b.id.clone())
            .collect()
    }
}

impl BlockManager for MemoryBlockManager {
    fn blocks(&self) -> Vec<Rc<dyn Block>> {
        self.blocks
            .borrow()
            .iter()
            .map(|b| b.clone() as Rc<dyn Block>)
            .collect()
    }

    fn get_block_by_id(&self, id: &str) -> Option<Rc<dyn Block>> {
        self.block_with_id(id).map(|b| b as Rc<dyn Block>)
    }

    fn get_block_by_index(&self, index: usize) -> Option<Rc<dyn Block>> {
        self.blocks
            .borrow()
            .get(index)
            .cloned()
            .map(|b| b as Rc<dyn Block>)
    }

    fn get_block_by_child_node(&self, node: NodeId) -> Option<Rc<dyn Block>> {
        let dom = self.dom.borrow();
        let wrapper = dom.closest_with_attr(node, markers::BLOCK_ID)?;
        let id = dom.attr(wrapper, markers::BLOCK_ID)?.to_string();
        drop(dom);
        self.get_block_by_id(&id)
    }

    fn get_block_index(&self, id: &str) -> Option<usize> {
        self.blocks.borrow().iter().position(|b| b.id == id)
    }

    fn current_block(&self) -> Option<Rc<dyn Block>> {
        let index = self.current.get()?;
        self.get_block_by_index(index)
    }

    fn insert(&self, request: InsertBlockRequest) -> Option<Rc<dyn Block>> {
        let index = request.index.min(self.blocks.borrow().len());
        let block = self.make_block(
            request.id,
            request.tool,
            request.data,
            request.tunes,
            index,
        );
        self.blocks.borrow_mut().insert(index, block.clone());
        Some(block as Rc<dyn Block>)
    }

    fn update(&self, block: &Rc<dyn Block>, data: &Value, tunes: Option<&Value>) {
        let Some(target) = self.block_with_id(&block.id()) else {
            return;
        };
        *target.data.borrow_mut() = data.clone();
        *target.tunes.borrow_mut() = tunes.cloned();
        let text = data
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut dom = self.dom.borrow_mut();
        if let Some(node) = dom.first_child(target.input) {
            let _ = dom.set_text(node, text);
        }
    }

    fn remove_block(&self, index: usize) {
        let mut blocks = self.blocks.borrow_mut();
        if index >= blocks.len() {
            return;
        }
        let block = blocks.remove(index);
        self.dom.borrow_mut().detach(block.holder);
    }

    fn move_block(&self, to_index: usize, from_index: usize) {
        let mut blocks = self.blocks.borrow_mut();
        if from_index >= blocks.len() || to_index >= blocks.len() {
            return;
        }
        let block = blocks.remove(from_index);
        blocks.insert(to_index, block.clone());
        let mut dom = self.dom.borrow_mut();
        dom.detach(block.holder);
        let _ = dom.insert_child_at(self.editor_root, block.holder, to_index);
    }

    fn clear(&self) {
        let mut blocks = self.blocks.borrow_mut();
        let mut dom = self.dom.borrow_mut();
        for block in blocks.drain(..) {
            dom.detach(block.holder);
        }
    }
}

pub struct MemoryRenderer {
    manager: Rc<MemoryBlockManager>,
}

impl Renderer for MemoryRenderer {
    fn render(&self, blocks: &[SavedBlock]) {
        self.manager.clear();
        for (index, saved) in blocks.iter().enumerate() {
            self.manager.insert(InsertBlockRequest {
                id: saved.id.clone(),
                tool: saved.tool.clone(),
                data: saved.data.clone(),
                tunes: saved.tunes.clone(),
                index,
                need_to_focus: false,
            });
        }
    }
}

#[derive(Default)]
pub struct MemoryObserver {
    pub enabled: Cell<bool>,
    pub disable_calls: Cell<usize>,
}

impl ModificationsObserver for MemoryObserver {
    fn enable(&self) {
        self.enabled.set(true);
    }

    fn disable(&self) {
        self.enabled.set(false);
        self.disable_calls.set(self.disable_calls.get() + 1);
    }
}

pub struct MemoryCaret {
    dom: Rc<RefCell<Dom>>,
}

impl CaretHelper for MemoryCaret {
    fn set_to_block(&self, block: &Rc<dyn Block>, placement: CaretPlacement) -> bool {
        let inputs = block.inputs();
        let Some(&input) = (match placement {
            CaretPlacement::Start => inputs.first(),
            _ => inputs.last(),
        }) else {
            return false;
        };
        let offset = match placement {
            CaretPlacement::Start => 0,
            _ => self.dom.borrow().text_content(input).chars().count(),
        };
        self.set_to_input(input, placement, offset)
    }

    fn set_to_input(&self, input: NodeId, placement: CaretPlacement, offset: usize) -> bool {
        let mut dom = self.dom.borrow_mut();
        let Some(text) = dom.first_child(input) else {
            return selection::set_cursor(&mut dom, input, 0);
        };
        let len = dom.text_len(text);
        let offset = match placement {
            CaretPlacement::Start => 0,
            CaretPlacement::End => len,
            CaretPlacement::Default => {
                if offset > len {
                    return false;
                }
                offset
            }
        };
        selection::set_cursor(&mut dom, text, offset)
    }
}

pub struct MemoryUi {
    pub editor_root: NodeId,
    pub wrapper: NodeId,
    pub toolbar: NodeId,
    pub toolbar_opened: Cell<bool>,
    pub multi_toolbar_opens: Cell<usize>,
    pub inline_toolbar_closes: Cell<usize>,
    pub hover_cooldowns: Cell<usize>,
    pub dragging: Cell<bool>,
}

impl EditorUi for MemoryUi {
    fn editor_root(&self) -> NodeId {
        self.editor_root
    }

    fn wrapper(&self) -> NodeId {
        self.wrapper
    }

    fn toolbar_wrapper(&self) -> Option<NodeId> {
        Some(self.toolbar)
    }

    fn some_toolbar_opened(&self) -> bool {
        self.toolbar_opened.get()
    }

    fn drag_in_progress(&self) -> bool {
        self.dragging.get()
    }

    fn disable_hover_for_cooldown(&self) {
        self.hover_cooldowns.set(self.hover_cooldowns.get() + 1);
    }

    fn open_multi_block_toolbar(&self) {
        self.multi_toolbar_opens.set(self.multi_toolbar_opens.get() + 1);
    }

    fn close_inline_toolbar(&self) {
        self.inline_toolbar_closes
            .set(self.inline_toolbar_closes.get() + 1);
    }
}

#[derive(Default)]
pub struct MemoryShortcuts {
    pub registered: RefCell<Vec<(KeyCombo, NodeId)>>,
}

impl ShortcutRegistrar for MemoryShortcuts {
    fn register(&self, combo: KeyCombo, target: NodeId) {
        self.registered.borrow_mut().push((combo, target));
    }

    fn unregister(&self, combo: KeyCombo, target: NodeId) {
        self.registered
            .borrow_mut()
            .retain(|(c, t)| !(c == &combo && *t == target));
    }
}

pub struct MemoryHost {
    pub manager: Rc<MemoryBlockManager>,
    pub renderer: MemoryRenderer,
    pub observer: MemoryObserver,
    pub caret: MemoryCaret,
    pub ui: MemoryUi,
    pub shortcuts: MemoryShortcuts,
}

impl EditorHost for MemoryHost {
    fn blocks(&self) -> &dyn BlockManager {
        &*self.manager
    }

    fn renderer(&self) -> &dyn Renderer {
        &self.renderer
    }

    fn observer(&self) -> &dyn ModificationsObserver {
        &self.observer
    }

    fn caret(&self) -> &dyn CaretHelper {
        &self.caret
    }

    fn ui(&self) -> &dyn EditorUi {
        &self.ui
    }

    fn shortcuts(&self) -> &dyn ShortcutRegistrar {
        &self.shortcuts
    }
}

/// Everything a test needs in one bundle.
pub struct TestRig {
    pub dom: Rc<RefCell<Dom>>,
    pub host: Rc<MemoryHost>,
    pub clock: Rc<ManualClock>,
    pub events: Rc<EventBus>,
    pub metrics: Rc<MonospaceMetrics>,
    pub coordinator: Rc<EditorCoordinator>,
}

impl TestRig {
    /// Build an editor with one paragraph per entry in `texts`, ids `b0..bn`.
    pub fn with_blocks(texts: &[&str]) -> Self {
        let dom = Rc::new(RefCell::new(Dom::new()));
        let (editor_root, wrapper, toolbar) = {
            let mut d = dom.borrow_mut();
            let wrapper = d.create_element("div");
            let editor_root = d.create_element("div");
            d.set_attr(editor_root, markers::EDITOR_ROOT, "true");
            let toolbar = d.create_element("div");
            let body = d.root();
            d.append_child(body, wrapper).unwrap();
            d.append_child(wrapper, editor_root).unwrap();
            d.append_child(wrapper, toolbar).unwrap();
            (editor_root, wrapper, toolbar)
        };

        let manager = Rc::new(MemoryBlockManager {
            dom: dom.clone(),
            editor_root,
            blocks: RefCell::new(Vec::new()),
            current: Cell::new(None),
            next_id: Cell::new(0),
        });
        for (index, text) in texts.iter().enumerate() {
            let id = SmolStr::new(format!("b{}", manager.next_id.get()));
            manager.next_id.set(manager.next_id.get() + 1);
            let block = manager.make_block(
                id,
                SmolStr::new("paragraph"),
                json!({ "text": *text }),
                None,
                index,
            );
            manager.blocks.borrow_mut().push(block);
        }

        let host = Rc::new(MemoryHost {
            renderer: MemoryRenderer {
                manager: manager.clone(),
            },
            observer: MemoryObserver {
                enabled: Cell::new(true),
                disable_calls: Cell::new(0),
            },
            caret: MemoryCaret { dom: dom.clone() },
            ui: MemoryUi {
                editor_root,
                wrapper,
                toolbar,
                toolbar_opened: Cell::new(false),
                multi_toolbar_opens: Cell::new(0),
                inline_toolbar_closes: Cell::new(0),
                hover_cooldowns: Cell::new(0),
                dragging: Cell::new(false),
            },
            shortcuts: MemoryShortcuts::default(),
            manager,
        });

        Self {
            dom,
            host,
            clock: ManualClock::new(),
            events: Rc::new(EventBus::new()),
            metrics: Rc::new(MonospaceMetrics::default()),
            coordinator: Rc::new(EditorCoordinator::new()),
        }
    }

    pub fn manager(&self) -> &MemoryBlockManager {
        &self.host.manager
    }

    /// Place a collapsed caret inside a block's input at a character offset.
    pub fn place_caret(&self, block_index: usize, offset: usize) {
        let block = self.manager().block(block_index);
        let mut dom = self.dom.borrow_mut();
        if let Some(text) = dom.first_child(block.input_node()) {
            selection::set_cursor(&mut dom, text, offset);
        }
        drop(dom);
        self.manager().set_current(block_index);
    }
}
