use crate::evolution::individual::Fitness;

/// Per-generation progress hooks for long runs.
pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(
        &mut self,
        generation: usize,
        best_fitness: Option<&Fitness>,
        archive_size: usize,
    );
}

/// No-op callback for silent runs.
pub struct NullProgressCallback;

impl ProgressCallback for NullProgressCallback {
    fn on_generation_start(&mut self, _generation: usize) {}

    fn on_generation_complete(
        &mut self,
        _generation: usize,
        _best_fitness: Option<&Fitness>,
        _archive_size: usize,
    ) {
    }
}

pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        println!("Generation {} starting...", generation + 1);
    }

    fn on_generation_complete(
        &mut self,
        generation: usize,
        best_fitness: Option<&Fitness>,
        archive_size: usize,
    ) {
        let best = best_fitness
            .map(|f| f.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "Generation {} complete. Best fitness: {}, archive size: {}",
            generation + 1,
            best,
            archive_size
        );
    }
}

/// Forwards progress over an mpsc channel, e.g. to a UI thread.
pub struct ChannelProgressCallback {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

#[derive(Debug, Clone)]
pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete {
        generation: usize,
        best_fitness: Option<Fitness>,
        archive_size: usize,
    },
}

impl ChannelProgressCallback {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(
        &mut self,
        generation: usize,
        best_fitness: Option<&Fitness>,
        archive_size: usize,
    ) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete {
            generation,
            best_fitness: best_fitness.cloned(),
            archive_size,
        });
    }
}
