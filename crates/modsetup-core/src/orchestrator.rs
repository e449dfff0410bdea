//! End-to-end setup run
//!
//! Reads the configured modules, plans their layouts into one shared source
//! root, then hands every file to the scheduler. The completion manifest is
//! written last, so its absence marks a tree from a run that did not finish.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{hash_config, ModuleInput, Precedence, SetupConfig};
use crate::descriptor;
use crate::di::Container;
use crate::errors::{Result, SetupError, Stage};
use crate::file_set::GlobalFileSet;
use crate::fs::{join_relative, recreate_dir, write_atomic};
use crate::manifest::{hash_file, InputRecord, TreeManifest};
use crate::module::{Module, ModuleReader};
use crate::planner::{self, ContentSource, FilePlan};
use crate::resolver::{EmbeddedResolver, ResolutionReport};
use crate::scheduler::{CancellationToken, ExecutionReport, Scheduler, WorkItem};

/// Which configured input a module came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Per-module outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSummary {
    pub name: String,
    pub role: Role,
    /// Entries in the module's own plan
    pub planned: usize,
    /// Entries this module ended up writing after the shared-root merge
    pub claimed: usize,
    pub resolution: ResolutionReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub modules: Vec<ModuleSummary>,
    pub report: ExecutionReport,
    /// Every file written, relative to the output directory, sorted
    pub files: Vec<String>,
}

struct ReadInput {
    role: Role,
    module: Arc<Module>,
    resolver: Arc<EmbeddedResolver>,
    resolution: ResolutionReport,
}

struct PlannedModule {
    module: Arc<Module>,
    resolver: Arc<EmbeddedResolver>,
    role: Role,
    plan: Arc<FilePlan>,
    claimed: FilePlan,
    resolution: ResolutionReport,
}

/// One setup run over a container's configuration
pub struct SetupTask {
    container: Container,
}

impl SetupTask {
    pub fn new(container: Container) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn run(&self, token: &CancellationToken) -> Result<RunSummary> {
        let config = self.container.config().clone();
        config.validate()?;

        let out_dir = config.out_dir.clone();
        let inputs = ordered_inputs(&config);
        let reader = ModuleReader::new(
            self.container.format().clone(),
            self.container.fallback_resolver().clone(),
            config.runtime.clone(),
        );

        let mut read = Vec::with_capacity(inputs.len());
        for (role, input) in &inputs {
            token.check()?;
            let module = reader
                .read(&input.path, input.version)
                .map_err(|e| e.at(Stage::ReadingModule))?;
            if module.resolution.not_found > 0 {
                info!(
                    "{}: {} reference(s) left to the decompiler's own lookup",
                    module.module.name, module.resolution.not_found
                );
            }
            read.push(ReadInput {
                role: *role,
                module: module.module,
                resolver: Arc::new(module.resolver),
                resolution: module.resolution,
            });
        }

        token.check()?;
        // The previous tree stays in place until every input has been read
        TreeManifest::invalidate(&out_dir).map_err(|e| e.at(Stage::Planning))?;
        recreate_dir(&out_dir).map_err(|e| e.at(Stage::Planning))?;

        let planned = self.plan_all(read).map_err(|e| e.at(Stage::Planning))?;

        let mut items = Vec::new();
        let mut files = Vec::new();
        for entry in &planned {
            self.push_module_items(entry, &config, &out_dir, &mut items, &mut files);
        }

        info!("Scheduling {} work items into {}", items.len(), out_dir.display());
        let report = Scheduler::new(config.max_parallelism)
            .execute(items, token, self.container.progress().as_ref())
            .map_err(|e| e.at(Stage::ExecutingItem))?;

        let manifest = TreeManifest::new(
            hash_config(&config),
            input_records(&inputs)?,
            files.clone(),
        );
        manifest
            .save(&out_dir)
            .map_err(|e| e.at(Stage::WritingDescriptor))?;
        info!("Setup complete: {} files written", manifest.files.len());

        Ok(RunSummary {
            modules: planned
                .iter()
                .map(|p| ModuleSummary {
                    name: p.module.name.clone(),
                    role: p.role,
                    planned: p.plan.len(),
                    claimed: p.claimed.len(),
                    resolution: p.resolution,
                })
                .collect(),
            report,
            files: manifest.files,
        })
    }

    fn plan_all(&self, read: Vec<ReadInput>) -> Result<Vec<PlannedModule>> {
        let mut file_set = GlobalFileSet::new();
        for ReadInput { module, .. } in &read {
            file_set.reserve(&module.name, &descriptor::project_file_name(module))?;
            file_set.reserve(&module.name, &descriptor::user_file_name(module))?;
            file_set.reserve(&module.name, &descriptor::metadata_path(module))?;
        }

        let filter = self.container.type_filter();
        let mut planned = Vec::with_capacity(read.len());
        for ReadInput {
            role,
            module,
            resolver,
            resolution,
        } in read
        {
            let plan = planner::plan(&module, filter.as_ref());
            plan.validate(&module.name)?;
            let claimed = file_set.claim(&module.name, &plan)?;
            info!(
                "Planned {}: {} files, {} after merge",
                module.name,
                plan.len(),
                claimed.len()
            );
            planned.push(PlannedModule {
                module,
                resolver,
                role,
                plan: Arc::new(plan),
                claimed,
                resolution,
            });
        }
        Ok(planned)
    }

    fn push_module_items(
        &self,
        planned: &PlannedModule,
        config: &Arc<SetupConfig>,
        out_dir: &Path,
        items: &mut Vec<WorkItem>,
        files: &mut Vec<String>,
    ) {
        let module = &planned.module;

        for entry in planned.claimed.entries() {
            let target = join_relative(out_dir, &entry.path);
            files.push(entry.path.clone());

            match &entry.source {
                ContentSource::Types(indices) => {
                    let module = module.clone();
                    let resolver = planned.resolver.clone();
                    let indices = indices.clone();
                    let decompiler = self.container.decompiler().clone();
                    let config = config.clone();
                    items.push(WorkItem::new(
                        format!("Decompiling {}", entry.path),
                        move |token| {
                            let types: Vec<_> =
                                indices.iter().filter_map(|&i| module.types.get(i)).collect();
                            let text = decompiler.decompile_types(
                                &module,
                                &types,
                                resolver.as_ref(),
                                &config.formatting,
                                token,
                            )?;
                            token.check()?;
                            write_atomic(&target, text.as_bytes())
                        },
                    ));
                }
                ContentSource::Resource(index) => {
                    let module = module.clone();
                    let index = *index;
                    items.push(WorkItem::new(
                        format!("Extracting {}", entry.path),
                        move |token| {
                            token.check()?;
                            let resource = module.resources.get(index).ok_or_else(|| {
                                SetupError::Decompile(format!(
                                    "resource #{} missing from {}",
                                    index, module.name
                                ))
                            })?;
                            write_atomic(&target, &resource.data)
                        },
                    ));
                }
            }
        }

        let project = descriptor::project_file_name(module);
        files.push(project.clone());
        {
            let module = module.clone();
            let plan = planned.plan.clone();
            let root = out_dir.to_path_buf();
            items.push(WorkItem::new(format!("Writing {}", project), move |token| {
                token.check()?;
                descriptor::write_project(&module, &plan, &root)
                    .map_err(|e| e.at(Stage::WritingDescriptor))
            }));
        }

        let user = descriptor::user_file_name(module);
        files.push(user.clone());
        {
            let module = module.clone();
            let working_dir = config.working_dir.clone();
            let root = out_dir.to_path_buf();
            items.push(WorkItem::new(format!("Writing {}", user), move |token| {
                token.check()?;
                descriptor::write_user(&module, working_dir.as_deref(), &root)
                    .map_err(|e| e.at(Stage::WritingDescriptor))
            }));
        }

        let metadata = descriptor::metadata_path(module);
        files.push(metadata.clone());
        {
            let module = module.clone();
            let decompiler = self.container.decompiler().clone();
            let config = config.clone();
            let target = join_relative(out_dir, &metadata);
            items.push(WorkItem::new(format!("Decompiling {}", metadata), move |token| {
                token.check()?;
                let text = decompiler.decompile_module_metadata(&module, &config.formatting)?;
                write_atomic(&target, text.as_bytes())
            }));
        }
    }
}

/// Inputs in processing order; earlier modules win shared paths
fn ordered_inputs(config: &SetupConfig) -> Vec<(Role, ModuleInput)> {
    let client = config
        .client
        .clone()
        .filter(|_| !config.server_only)
        .map(|input| (Role::Client, input));
    let server = config.server.clone().map(|input| (Role::Server, input));

    match config.precedence {
        Precedence::ClientFirst => client.into_iter().chain(server).collect(),
        Precedence::ServerFirst => server.into_iter().chain(client).collect(),
    }
}

fn input_records(inputs: &[(Role, ModuleInput)]) -> Result<Vec<InputRecord>> {
    inputs
        .iter()
        .map(|(_, input)| {
            Ok(InputRecord {
                path: input.path.clone(),
                hash: hash_file(&input.path).map_err(|e| e.at(Stage::ReadingModule))?,
            })
        })
        .collect()
}

/// Convenience: run with the production container
pub fn run_setup(config: SetupConfig, token: &CancellationToken) -> Result<RunSummary> {
    SetupTask::new(Container::new(config)).run(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Version;
    use std::path::PathBuf;

    fn input(name: &str) -> ModuleInput {
        ModuleInput {
            path: PathBuf::from(name),
            version: Version::new(1, 0, 0, 0),
        }
    }

    fn config_with_both() -> SetupConfig {
        SetupConfig {
            client: Some(input("Terraria.exe")),
            server: Some(input("TerrariaServer.exe")),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_first_order() {
        let roles: Vec<Role> = ordered_inputs(&config_with_both())
            .into_iter()
            .map(|(role, _)| role)
            .collect();
        assert_eq!(roles, vec![Role::Client, Role::Server]);
    }

    #[test]
    fn test_server_first_order() {
        let config = SetupConfig {
            precedence: Precedence::ServerFirst,
            ..config_with_both()
        };
        let roles: Vec<Role> = ordered_inputs(&config)
            .into_iter()
            .map(|(role, _)| role)
            .collect();
        assert_eq!(roles, vec![Role::Server, Role::Client]);
    }

    #[test]
    fn test_server_only_drops_client() {
        let config = SetupConfig {
            server_only: true,
            ..config_with_both()
        };
        let inputs = ordered_inputs(&config);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].0, Role::Server);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_touching_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("keep.cs"), "x").unwrap();

        let config = SetupConfig {
            out_dir: out.clone(),
            ..Default::default()
        };
        let err = run_setup(config, &CancellationToken::new()).unwrap_err();

        assert!(matches!(err, SetupError::Config(_)));
        assert!(out.join("keep.cs").exists());
    }
}
