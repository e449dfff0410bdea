use indexmap::IndexMap;
use tracing::debug;

use crate::errors::{Result, SetupError};
use crate::planner::{FilePlan, PathKey};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Claim {
    Entry { owner: String },
    Reserved { owner: String },
}

/// Union of every module's planned files for one run
///
/// Both modules write into the same source root. The first module to claim a
/// path materializes it; later claims of the same path are dropped. The set is
/// filled sequentially during planning and is read-only once items run.
#[derive(Debug, Default)]
pub struct GlobalFileSet {
    claims: IndexMap<PathKey, Claim>,
}

impl GlobalFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a path written by `owner` outside its file plan (descriptors)
    pub fn reserve(&mut self, owner: &str, path: &str) -> Result<()> {
        let key = PathKey::new(path);
        if self.claims.contains_key(&key) {
            return Err(SetupError::PlanningCollision {
                module: owner.to_string(),
                path: path.to_string(),
            });
        }
        self.claims.insert(
            key,
            Claim::Reserved {
                owner: owner.to_string(),
            },
        );
        Ok(())
    }

    /// Claim `plan` for `owner`, returning the entries it must materialize
    pub fn claim(&mut self, owner: &str, plan: &FilePlan) -> Result<FilePlan> {
        let mut claimed = Vec::new();

        for entry in plan.entries() {
            let key = entry.key();
            match self.claims.get(&key) {
                None => {
                    self.claims.insert(
                        key,
                        Claim::Entry {
                            owner: owner.to_string(),
                        },
                    );
                    claimed.push(entry.clone());
                }
                Some(Claim::Entry { owner: first }) => {
                    if first == owner {
                        return Err(SetupError::PlanningCollision {
                            module: owner.to_string(),
                            path: entry.path.clone(),
                        });
                    }
                    debug!("{} already provided by {}", entry.path, first);
                }
                Some(Claim::Reserved { .. }) => {
                    return Err(SetupError::PlanningCollision {
                        module: owner.to_string(),
                        path: entry.path.clone(),
                    });
                }
            }
        }

        Ok(FilePlan::new(claimed))
    }

    /// Module materializing `path`, if any
    pub fn owner_of(&self, path: &str) -> Option<&str> {
        self.claims
            .get(&PathKey::new(path))
            .map(|claim| match claim {
                Claim::Entry { owner } | Claim::Reserved { owner } => owner.as_str(),
            })
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
