//! # 解码任务队列
//!
//! ## 设计思路
//!
//! 限制同时进行的解码数量，控制原生解码带来的内存与 CPU 压力，同时支持
//! 每个任务的取消与超时：
//! - 等待中的任务严格 FIFO 进入运行态
//! - 入队前或等待期间已取消的任务直接以 `Cancelled` 结束，不占用并发槽位
//! - 设置超时的任务与计时器竞争，超时返回 `Timeout`，任务本身被分离而非强制终止
//! - 每个任务只结算一次；任务出错、超时、panic 都不影响后续任务
//!
//! ## 实现思路
//!
//! - 状态（运行数 + 等待队列）放在一把 `Mutex` 里，只在出队/入队时短暂持有。
//! - 运行中的任务持有 [`SlotGuard`]，其 `Drop` 负责归还槽位并继续出队，
//!   因此无论正常结束、超时还是被丢弃，槽位都一定会被归还。
//! - 任务在独立的 tokio 任务中执行，收到的是调用方信号的子令牌；超时时取消
//!   子令牌，协作式任务可以尽早退出。

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::PixelError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;
type Launch = Box<dyn FnOnce(Result<SlotGuard, PixelError>) -> Option<Job> + Send>;

struct QueuedTask {
    id: u64,
    signal: CancellationToken,
    launch: Launch,
}

#[derive(Default)]
struct QueueState {
    running: usize,
    next_id: u64,
    pending: VecDeque<QueuedTask>,
}

struct QueueShared {
    concurrency: usize,
    state: Mutex<QueueState>,
}

impl QueueShared {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 运行中任务占用的槽位，释放时归还并继续出队。
struct SlotGuard {
    shared: Arc<QueueShared>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock_state();
            state.running = state.running.saturating_sub(1);
        }
        drain(&self.shared);
    }
}

/// 有界并发任务队列。克隆得到的是同一个队列的句柄。
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<QueueShared>,
}

impl TaskQueue {
    /// 创建队列；`concurrency` 必须 >= 1。
    pub fn new(concurrency: usize) -> Result<Self, PixelError> {
        if concurrency < 1 {
            return Err(PixelError::Config(format!(
                "队列并发数必须 >= 1（当前：{}）",
                concurrency
            )));
        }

        Ok(Self {
            shared: Arc::new(QueueShared {
                concurrency,
                state: Mutex::new(QueueState::default()),
            }),
        })
    }

    pub fn concurrency(&self) -> usize {
        self.shared.concurrency
    }

    /// 当前运行中的任务数。
    pub fn running(&self) -> usize {
        self.shared.lock_state().running
    }

    /// 当前等待中的任务数。
    pub fn pending(&self) -> usize {
        self.shared.lock_state().pending.len()
    }

    /// 入队一个任务。
    ///
    /// 入队与首次出队尝试在调用时同步完成；返回的 future 只负责等待结果。
    /// `task` 收到的令牌在调用方取消或任务超时时被触发。
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn enqueue<T, F, Fut>(
        &self,
        task: F,
        signal: Option<CancellationToken>,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<T, PixelError>> + Send + use<T, F, Fut>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, PixelError>> + Send + 'static,
    {
        let signal = signal.unwrap_or_else(CancellationToken::new);
        let (tx, mut rx) = oneshot::channel::<Result<T, PixelError>>();

        let task_signal = signal.clone();
        let launch: Launch = Box::new(
            move |admission: Result<SlotGuard, PixelError>| -> Option<Job> {
                match admission {
                    Ok(slot) => {
                        let job: Job = Box::pin(async move {
                            let result = run_task(task, task_signal, timeout).await;
                            // 先归还槽位，调用方拿到结果时运行数已经更新
                            drop(slot);
                            let _ = tx.send(result);
                        });
                        Some(job)
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err));
                        None
                    }
                }
            },
        );

        let id = {
            let mut state = self.shared.lock_state();
            let id = state.next_id;
            state.next_id = state.next_id.wrapping_add(1);
            state.pending.push_back(QueuedTask {
                id,
                signal: signal.clone(),
                launch,
            });
            id
        };

        drain(&self.shared);

        let shared = Arc::clone(&self.shared);
        async move {
            tokio::select! {
                biased;
                result = &mut rx => return flatten(result),
                _ = signal.cancelled() => {}
            }

            if withdraw(&shared, id) {
                log::debug!("🛑 等待中的任务已取消 (id={})", id);
                return Err(PixelError::Cancelled);
            }

            // 已经开始运行：取消由任务自己协作处理
            flatten(rx.await)
        }
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("TaskQueue")
            .field("concurrency", &self.shared.concurrency)
            .field("running", &state.running)
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// 有空闲槽位时按 FIFO 放行等待任务。
fn drain(shared: &Arc<QueueShared>) {
    loop {
        let (entry, admission) = {
            let mut state = shared.lock_state();
            if state.running >= shared.concurrency {
                return;
            }
            let Some(entry) = state.pending.pop_front() else {
                return;
            };

            if entry.signal.is_cancelled() {
                (entry, Err(PixelError::Cancelled))
            } else {
                state.running += 1;
                let slot = SlotGuard {
                    shared: Arc::clone(shared),
                };
                (entry, Ok(slot))
            }
        };

        let id = entry.id;
        let Some(job) = (entry.launch)(admission) else {
            log::debug!("🛑 任务在开始前已取消，跳过 (id={})", id);
            continue;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(job);
            }
            Err(err) => {
                // job 被丢弃：槽位随 SlotGuard 归还，调用方收到 Internal
                log::warn!("⚠️ 当前线程没有 tokio 运行时，任务无法启动 (id={}): {}", id, err);
                drop(job);
            }
        }
    }
}

/// 从等待队列中撤回任务；已经开始或已结算时返回 `false`。
fn withdraw(shared: &QueueShared, id: u64) -> bool {
    let removed = {
        let mut state = shared.lock_state();
        state
            .pending
            .iter()
            .position(|entry| entry.id == id)
            .and_then(|index| state.pending.remove(index))
    };
    // 在锁外释放任务闭包
    removed.is_some()
}

async fn run_task<T, F, Fut>(
    task: F,
    signal: CancellationToken,
    timeout: Option<Duration>,
) -> Result<T, PixelError>
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, PixelError>> + Send + 'static,
{
    let task_signal = signal.child_token();
    let mut handle = tokio::spawn(task(task_signal.clone()));

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                task_signal.cancel();
                let after_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                log::warn!("⏱️ 队列任务超时 ({}ms)，任务已分离", after_ms);
                return Err(PixelError::Timeout { after_ms });
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(PixelError::Internal("队列任务 panic".to_string())),
        Err(err) => Err(PixelError::Internal(format!("队列任务被中止：{}", err))),
    }
}

fn flatten<T>(received: Result<Result<T, PixelError>, oneshot::error::RecvError>) -> Result<T, PixelError> {
    received.unwrap_or_else(|_| Err(PixelError::Internal("队列任务在结算前被丢弃".to_string())))
}
