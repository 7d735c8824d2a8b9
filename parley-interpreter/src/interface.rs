use parley_core::Anomaly;

/// What the host is told about a block when it is offered or said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRef {
    pub name: String,
    pub full_name: String,
    /// Name of the character or player the block was declared under.
    pub speaker: Option<String>,
    pub by_player: bool,
    /// The block's `output` after its last run.
    pub text: String,
}

/// Host callbacks. The interpreter blocks on `present_choice` until the host
/// answers.
pub trait Interface {
    /// Index into `choices` of the block to continue with.
    fn present_choice(&mut self, choices: &[BlockRef]) -> usize;

    fn log_message(&mut self, text: &str, user_output: bool);

    fn say_block(&mut self, block: &BlockRef);

    fn handle_error(&mut self, error: &Anomaly);
}
