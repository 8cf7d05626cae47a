use crate::node::NodeId;
use crc32fast::Hasher;

/// Generate a project seed from its name using CRC32
pub fn get_project_seed(name: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(name.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential ID generator for nodes within one project
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u64,
}

impl IdGenerator {
    pub fn new(name: &str) -> Self {
        Self {
            seed: get_project_seed(name),
            count: 0,
        }
    }

    pub fn from_seed(seed: String) -> Self {
        Self { seed, count: 0 }
    }

    /// Generate the next sequential ID that `taken` does not reject.
    ///
    /// Imported nodes keep their own ids, so the counter may land on an id
    /// that is already in use.
    pub fn next_id(&mut self, taken: impl Fn(&NodeId) -> bool) -> NodeId {
        loop {
            self.count += 1;
            let id = NodeId::new(format!("{}-{}", self.seed, self.count));
            if !taken(&id) {
                return id;
            }
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}
