// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SchedulerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SchedulerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.scheduler,
            raw.resources,
            raw.task,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_scheduler_section(cfg)?;
    validate_task_entries(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(SchedulerError::Config(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.max_workers == 0 {
        return Err(SchedulerError::Config(
            "[scheduler].max_workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.scheduler.max_batch_capacity == 0 {
        return Err(SchedulerError::Config(
            "[scheduler].max_batch_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_entries(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.cost == 0 {
            return Err(SchedulerError::InvalidResourceSpec {
                task: name.clone(),
                reason: "cost must be positive".to_string(),
            });
        }

        for (resource, &amount) in task.requires.iter() {
            match cfg.resources.get(resource) {
                None => {
                    return Err(SchedulerError::InvalidResourceSpec {
                        task: name.clone(),
                        reason: format!("unknown resource '{resource}'"),
                    });
                }
                Some(&total) if amount > total => {
                    return Err(SchedulerError::InvalidResourceSpec {
                        task: name.clone(),
                        reason: format!(
                            "requires {amount} of '{resource}' but total capacity is {total}"
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(SchedulerError::Config(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
            if dep == name {
                return Err(SchedulerError::CyclicDependency(name.clone()));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task. For:
    //   [task.b]
    //   after = ["a"]
    // we add edge a -> b.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort fails iff there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(SchedulerError::CyclicDependency(
            cycle.node_id().to_string(),
        )),
    }
}
