//! Budget to task allocation.
//!
//! A campaign with `target_actions = n` gets exactly `n` tasks. Task `i`
//! cycles through watch, like, subscribe, so per-type counts never differ
//! by more than one. The allocation is a pure function of its inputs.

use serde::{Deserialize, Serialize};
use subloop_types::TaskType;

use crate::{CampaignError, Result};

/// Order in which task types are assigned.
pub const TASK_CYCLE: [TaskType; 3] = [TaskType::Watch, TaskType::Like, TaskType::Subscribe];

/// Credits paid for completing one task of a type.
pub fn reward_for(task_type: TaskType) -> i64 {
    match task_type {
        TaskType::Watch => 1,
        TaskType::Like => 2,
        TaskType::Subscribe => 5,
    }
}

/// Upper bounds on campaign size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_target_actions: u32,
    pub max_credits_per_campaign: i64,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            max_target_actions: 1_000,
            max_credits_per_campaign: 100_000,
        }
    }
}

/// One task in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedTask {
    pub index: u32,
    pub task_type: TaskType,
    pub credits_reward: i64,
}

/// The full allocation for a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignPlan {
    pub tasks: Vec<PlannedTask>,
    pub watch_count: u32,
    pub like_count: u32,
    pub subscribe_count: u32,
    /// Credits paid out if every task is completed.
    pub total_reward: i64,
    /// Allocated credits that no task will consume; refunded at the end.
    pub surplus: i64,
}

/// Allocate `credits_allocated` over `target_actions` tasks.
pub fn plan_tasks(
    credits_allocated: i64,
    target_actions: u32,
    limits: &PlanLimits,
) -> Result<CampaignPlan> {
    if target_actions == 0 || target_actions > limits.max_target_actions {
        return Err(CampaignError::InvalidTarget {
            target: target_actions,
            max: limits.max_target_actions,
        });
    }
    if credits_allocated <= 0 || credits_allocated > limits.max_credits_per_campaign {
        return Err(CampaignError::InvalidBudget {
            credits: credits_allocated,
            max: limits.max_credits_per_campaign,
        });
    }

    let tasks: Vec<PlannedTask> = (0..target_actions)
        .map(|index| {
            let task_type = TASK_CYCLE[index as usize % TASK_CYCLE.len()];
            PlannedTask {
                index,
                task_type,
                credits_reward: reward_for(task_type),
            }
        })
        .collect();

    let count = |tt: TaskType| tasks.iter().filter(|t| t.task_type == tt).count() as u32;
    let total_reward: i64 = tasks.iter().map(|t| t.credits_reward).sum();

    if total_reward > credits_allocated {
        return Err(CampaignError::BudgetExceeded {
            required: total_reward,
            allocated: credits_allocated,
        });
    }

    Ok(CampaignPlan {
        watch_count: count(TaskType::Watch),
        like_count: count(TaskType::Like),
        subscribe_count: count(TaskType::Subscribe),
        total_reward,
        surplus: credits_allocated - total_reward,
        tasks,
    })
}

/// Smallest budget that covers `target_actions` tasks.
pub fn minimum_budget(target_actions: u32) -> i64 {
    (0..target_actions)
        .map(|i| reward_for(TASK_CYCLE[i as usize % TASK_CYCLE.len()]))
        .sum()
}
