pub type BlockId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Echo of a user prompt, as broadcast by the gateway.
    UserEcho,
    /// Streamed assistant text for one turn segment.
    Text,
    /// One tool invocation: header, streamed output, status marker.
    Tool {
        tool_name: String,
        tool_call_id: String,
    },
    Error,
    /// Local or meta information ([Abort sent], model list, shell output).
    Notice,
    CompactionSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub text: String,
    pub finalized: bool,
}

/// Ordered, append-only ledger of display units. At most one text block and
/// one tool block are open at a time; opening a new block of either kind
/// finalizes the previous one of that kind. Ids grow monotonically and
/// survive `clear`, so a render operation can never alias a stale block.
#[derive(Debug, Default)]
pub struct BlockLedger {
    blocks: Vec<Block>,
    next_id: BlockId,
    open_text: Option<BlockId>,
    open_tool: Option<BlockId>,
}

impl BlockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn open_text_id(&self) -> Option<BlockId> {
        self.open_text
    }

    pub fn open_tool_id(&self) -> Option<BlockId> {
        self.open_tool
    }

    pub fn snapshot(&self, id: BlockId) -> Option<Block> {
        self.blocks.iter().find(|b| b.id == id).cloned()
    }

    /// Appends an already-final block and returns a copy of it.
    pub fn push_final(&mut self, kind: BlockKind, text: String) -> Block {
        let block = Block {
            id: self.take_id(),
            kind,
            text,
            finalized: true,
        };
        self.blocks.push(block.clone());
        block
    }

    /// Opens a text block. Returns the previously open text block (now
    /// finalized) if there was one, plus a copy of the new block.
    pub fn open_text(&mut self, initial: String) -> (Option<Block>, Block) {
        let finalized = self.open_text.and_then(|id| self.finalize(id));
        let block = Block {
            id: self.take_id(),
            kind: BlockKind::Text,
            text: initial,
            finalized: false,
        };
        self.open_text = Some(block.id);
        self.blocks.push(block.clone());
        (finalized, block)
    }

    /// Opens a tool block, finalizing a previously open tool block if any.
    pub fn open_tool(
        &mut self,
        tool_name: &str,
        tool_call_id: &str,
        header: String,
    ) -> (Option<Block>, Block) {
        let finalized = self.open_tool.and_then(|id| self.finalize(id));
        let block = Block {
            id: self.take_id(),
            kind: BlockKind::Tool {
                tool_name: tool_name.to_string(),
                tool_call_id: tool_call_id.to_string(),
            },
            text: header,
            finalized: false,
        };
        self.open_tool = Some(block.id);
        self.blocks.push(block.clone());
        (finalized, block)
    }

    /// Appends to an open block. Returns false for finalized or unknown ids.
    pub fn append_text(&mut self, id: BlockId, delta: &str) -> bool {
        match self.blocks.iter_mut().find(|b| b.id == id && !b.finalized) {
            Some(block) => {
                block.text.push_str(delta);
                true
            }
            None => false,
        }
    }

    /// Replaces an open block's content. Returns false for finalized or
    /// unknown ids.
    pub fn set_text(&mut self, id: BlockId, text: String) -> bool {
        match self.blocks.iter_mut().find(|b| b.id == id && !b.finalized) {
            Some(block) => {
                block.text = text;
                true
            }
            None => false,
        }
    }

    /// Marks a block immutable and releases its open slot. Returns a copy of
    /// the finalized block, or None if the id is unknown.
    pub fn finalize(&mut self, id: BlockId) -> Option<Block> {
        let block = self.blocks.iter_mut().find(|b| b.id == id)?;
        block.finalized = true;
        if self.open_text == Some(id) {
            self.open_text = None;
        }
        if self.open_tool == Some(id) {
            self.open_tool = None;
        }
        Some(block.clone())
    }

    /// Drops every block (compaction). Ids keep counting upward.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.open_text = None;
        self.open_tool = None;
    }

    fn take_id(&mut self) -> BlockId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_text_finalizes_previous_text_block() {
        let mut ledger = BlockLedger::new();
        let (none, first) = ledger.open_text("a".to_string());
        assert!(none.is_none());

        let (finalized, second) = ledger.open_text("b".to_string());
        let finalized = finalized.expect("first block should be finalized");
        assert_eq!(finalized.id, first.id);
        assert!(finalized.finalized);
        assert_eq!(ledger.open_text_id(), Some(second.id));
    }

    #[test]
    fn test_text_and_tool_slots_are_independent() {
        let mut ledger = BlockLedger::new();
        let (_, text) = ledger.open_text(String::new());
        let (none, tool) = ledger.open_tool("bash", "t1", "[bash] $ ls".to_string());
        assert!(none.is_none());
        assert_eq!(ledger.open_text_id(), Some(text.id));
        assert_eq!(ledger.open_tool_id(), Some(tool.id));
    }

    #[test]
    fn test_append_refuses_finalized_blocks() {
        let mut ledger = BlockLedger::new();
        let (_, block) = ledger.open_text("a".to_string());
        assert!(ledger.append_text(block.id, "b"));
        ledger.finalize(block.id);
        assert!(!ledger.append_text(block.id, "c"));
        assert_eq!(ledger.snapshot(block.id).unwrap().text, "ab");
    }

    #[test]
    fn test_clear_preserves_id_monotonicity() {
        let mut ledger = BlockLedger::new();
        let first = ledger.push_final(BlockKind::Notice, "a".to_string());
        ledger.clear();
        assert!(ledger.blocks().is_empty());
        assert_eq!(ledger.open_text_id(), None);
        let second = ledger.push_final(BlockKind::Notice, "b".to_string());
        assert!(second.id > first.id);
    }
}
