//! In-memory repositories and wiring shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::macros::datetime;

use bistro::application::menu::MenuService;
use bistro::application::orders::OrderService;
use bistro::application::repos::{
    HealthRepo, MenuRepo, NewOrder, OrderChanges, OrderWrite, OrdersRepo, RepoError, TableResize,
    TablesRepo,
};
use bistro::application::tables::TableService;
use bistro::cache::{CacheConfig, CacheLayer, MemoryBackend};
use bistro::domain::entities::{DishRecord, OrderItemView, OrderLine, OrderView, TableRecord};
use bistro::domain::menu::DishDraft;
use bistro::domain::types::{OrderStatus, UserRole};
use bistro::infra::http::{ApiState, RateLimitPolicy};

pub const WAITER_ID: i64 = 1;
pub const SECOND_WAITER_ID: i64 = 2;
pub const ADMIN_ID: i64 = 3;

#[derive(Default)]
pub struct Calls {
    pub list_dishes: AtomicUsize,
    pub list_tables: AtomicUsize,
    pub list_available_tables: AtomicUsize,
    pub find_order_view: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct StoredOrder {
    code: String,
    table_number: i32,
    status: OrderStatus,
    waiter_id: Option<i64>,
    lines: Vec<(i64, OrderLine)>,
}

struct State {
    dishes: BTreeMap<i64, DishRecord>,
    tables: BTreeMap<i32, TableRecord>,
    orders: BTreeMap<i64, StoredOrder>,
    users: BTreeMap<i64, (String, UserRole)>,
    next_dish_id: i64,
    next_order_id: i64,
    next_item_id: i64,
    next_table_id: i64,
}

/// Source of truth for the tests: every repository trait over one locked state.
pub struct InMemoryRestaurant {
    state: Mutex<State>,
    pub calls: Calls,
    healthy: std::sync::atomic::AtomicBool,
}

impl InMemoryRestaurant {
    pub fn new(total_tables: i32) -> Self {
        let mut users = BTreeMap::new();
        users.insert(WAITER_ID, ("anna".to_string(), UserRole::Waiter));
        users.insert(SECOND_WAITER_ID, ("boris".to_string(), UserRole::Waiter));
        users.insert(ADMIN_ID, ("root".to_string(), UserRole::Admin));

        let mut state = State {
            dishes: BTreeMap::new(),
            tables: BTreeMap::new(),
            orders: BTreeMap::new(),
            users,
            next_dish_id: 1,
            next_order_id: 1,
            next_item_id: 1,
            next_table_id: 1,
        };
        for number in 1..=total_tables {
            add_table(&mut state, number);
        }

        Self {
            state: Mutex::new(state),
            calls: Calls::default(),
            healthy: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn remove_user(&self, id: i64) {
        let mut state = self.state.lock().unwrap();
        state.users.remove(&id);
        for order in state.orders.values_mut() {
            if order.waiter_id == Some(id) {
                order.waiter_id = None;
            }
        }
    }

    pub fn table(&self, number: i32) -> Option<TableRecord> {
        self.state.lock().unwrap().tables.get(&number).cloned()
    }

    /// Changes a dish behind the services' back, as another process would.
    pub fn rename_dish_directly(&self, id: i64, name: &str) {
        if let Some(dish) = self.state.lock().unwrap().dishes.get_mut(&id) {
            dish.name = name.to_string();
        }
    }

    fn view(state: &State, id: i64) -> Option<OrderView> {
        let order = state.orders.get(&id)?;
        let items = order
            .lines
            .iter()
            .map(|(item_id, line)| {
                let dish = state.dishes.get(&line.dish_id);
                OrderItemView {
                    id: *item_id,
                    dish_id: line.dish_id,
                    dish_name: dish.map(|d| d.name.clone()).unwrap_or_default(),
                    dish_price: dish.map(|d| d.price).unwrap_or_default(),
                    quantity: line.quantity,
                }
            })
            .collect();
        let waiter_name = order
            .waiter_id
            .and_then(|waiter| state.users.get(&waiter))
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        Some(OrderView {
            id,
            code: Some(order.code.clone()),
            table_number: order.table_number,
            status: order.status,
            created_at: datetime!(2024-05-01 18:30:00 UTC),
            waiter_id: order.waiter_id,
            waiter_name,
            items,
        })
    }
}

fn add_table(state: &mut State, number: i32) {
    let id = state.next_table_id;
    state.next_table_id += 1;
    state.tables.insert(
        number,
        TableRecord {
            id,
            number,
            is_available: true,
            current_order_id: None,
        },
    );
}

fn release(state: &mut State, number: i32, order_id: i64) {
    if let Some(table) = state.tables.get_mut(&number) {
        if table.current_order_id.is_none_or(|current| current == order_id) {
            table.is_available = true;
            table.current_order_id = None;
        }
    }
}

fn occupy(state: &mut State, number: i32, order_id: i64) {
    if let Some(table) = state.tables.get_mut(&number) {
        table.is_available = false;
        table.current_order_id = Some(order_id);
    }
}

fn check_lines(state: &State, lines: &[OrderLine]) -> Result<(), RepoError> {
    match lines
        .iter()
        .find(|line| !state.dishes.contains_key(&line.dish_id))
    {
        Some(line) => Err(RepoError::InvalidInput {
            message: format!("dish {} does not exist", line.dish_id),
        }),
        None => Ok(()),
    }
}

fn number_lines(state: &mut State, lines: &[OrderLine]) -> Vec<(i64, OrderLine)> {
    lines
        .iter()
        .map(|line| {
            let id = state.next_item_id;
            state.next_item_id += 1;
            (id, *line)
        })
        .collect()
}

#[async_trait]
impl MenuRepo for InMemoryRestaurant {
    async fn list_dishes(&self) -> Result<Vec<DishRecord>, RepoError> {
        self.calls.list_dishes.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().dishes.values().cloned().collect())
    }

    async fn find_dish(&self, id: i64) -> Result<Option<DishRecord>, RepoError> {
        Ok(self.state.lock().unwrap().dishes.get(&id).cloned())
    }

    async fn create_dish(&self, draft: &DishDraft) -> Result<DishRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_dish_id;
        state.next_dish_id += 1;
        let dish = DishRecord {
            id,
            name: draft.name.clone(),
            description: draft.description.clone(),
            price: draft.price,
            available: draft.available,
        };
        state.dishes.insert(id, dish.clone());
        Ok(dish)
    }

    async fn update_dish(&self, id: i64, draft: &DishDraft) -> Result<DishRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        let dish = state.dishes.get_mut(&id).ok_or(RepoError::NotFound)?;
        dish.name = draft.name.clone();
        dish.description = draft.description.clone();
        dish.price = draft.price;
        dish.available = draft.available;
        Ok(dish.clone())
    }

    async fn delete_dish(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.lock().unwrap();
        let referenced = state
            .orders
            .values()
            .any(|order| order.lines.iter().any(|(_, line)| line.dish_id == id));
        if referenced {
            return Err(RepoError::InvalidInput {
                message: format!("dish {id} is referenced by an order"),
            });
        }
        state
            .dishes
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl TablesRepo for InMemoryRestaurant {
    async fn list_tables(&self) -> Result<Vec<TableRecord>, RepoError> {
        self.calls.list_tables.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().tables.values().cloned().collect())
    }

    async fn list_available_tables(&self) -> Result<Vec<TableRecord>, RepoError> {
        self.calls.list_available_tables.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .unwrap()
            .tables
            .values()
            .filter(|table| table.is_available)
            .cloned()
            .collect())
    }

    async fn ensure_tables(&self, total: i32) -> Result<(), RepoError> {
        let mut state = self.state.lock().unwrap();
        if state.tables.is_empty() {
            for number in 1..=total {
                add_table(&mut state, number);
            }
        }
        Ok(())
    }

    async fn resize_tables(&self, total: i32) -> Result<TableResize, RepoError> {
        let mut state = self.state.lock().unwrap();
        let busiest = state
            .tables
            .values()
            .filter(|table| !table.is_available)
            .map(|table| table.number)
            .max();
        if let Some(busiest) = busiest.filter(|busiest| *busiest > total) {
            return Ok(TableResize::BelowBusyTable { busiest });
        }
        for number in 1..=total {
            if !state.tables.contains_key(&number) {
                add_table(&mut state, number);
            }
        }
        state
            .tables
            .retain(|number, table| *number <= total || !table.is_available);
        Ok(TableResize::Resized { total })
    }
}

#[async_trait]
impl OrdersRepo for InMemoryRestaurant {
    async fn list_orders(&self, waiter_id: Option<i64>) -> Result<Vec<OrderView>, RepoError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .iter()
            .filter(|(_, order)| waiter_id.is_none() || order.waiter_id == waiter_id)
            .filter_map(|(id, _)| Self::view(&state, *id))
            .collect())
    }

    async fn find_order_view(&self, id: i64) -> Result<Option<OrderView>, RepoError> {
        self.calls.find_order_view.fetch_add(1, Ordering::SeqCst);
        Ok(Self::view(&self.state.lock().unwrap(), id))
    }

    async fn create_order(&self, order: &NewOrder) -> Result<OrderWrite, RepoError> {
        let mut state = self.state.lock().unwrap();
        let is_waiter = matches!(
            state.users.get(&order.waiter_id),
            Some((_, UserRole::Waiter))
        );
        if !is_waiter {
            return Ok(OrderWrite::WaiterNotFound {
                waiter_id: order.waiter_id,
            });
        }
        match state.tables.get(&order.table_number) {
            None => {
                return Ok(OrderWrite::TableNotFound {
                    number: order.table_number,
                });
            }
            Some(table) if !table.is_available => {
                return Ok(OrderWrite::TableUnavailable {
                    number: order.table_number,
                });
            }
            Some(_) => {}
        }
        if state.orders.values().any(|stored| stored.code == order.code) {
            return Err(RepoError::Duplicate {
                constraint: "orders_code_key".to_string(),
            });
        }
        check_lines(&state, &order.lines)?;

        let order_id = state.next_order_id;
        state.next_order_id += 1;
        let lines = number_lines(&mut state, &order.lines);
        state.orders.insert(
            order_id,
            StoredOrder {
                code: order.code.clone(),
                table_number: order.table_number,
                status: OrderStatus::Pending,
                waiter_id: Some(order.waiter_id),
                lines,
            },
        );
        occupy(&mut state, order.table_number, order_id);
        Ok(OrderWrite::Applied { order_id })
    }

    async fn update_order(
        &self,
        id: i64,
        changes: &OrderChanges,
    ) -> Result<OrderWrite, RepoError> {
        let mut state = self.state.lock().unwrap();
        let Some(current_table) = state.orders.get(&id).map(|order| order.table_number) else {
            return Ok(OrderWrite::OrderNotFound);
        };
        if let Some(lines) = changes.lines.as_deref() {
            check_lines(&state, lines)?;
        }

        let mut table_number = current_table;
        if let Some(target) = changes.table_number.filter(|target| *target != current_table) {
            match state.tables.get(&target) {
                None => return Ok(OrderWrite::TableNotFound { number: target }),
                Some(table) if !table.is_available && table.current_order_id != Some(id) => {
                    return Ok(OrderWrite::TableUnavailable { number: target });
                }
                Some(_) => {}
            }
            release(&mut state, current_table, id);
            occupy(&mut state, target, id);
            table_number = target;
        }

        let new_lines = changes
            .lines
            .as_deref()
            .map(|lines| number_lines(&mut state, lines));
        if let Some(order) = state.orders.get_mut(&id) {
            order.table_number = table_number;
            if let Some(status) = changes.status {
                order.status = status;
            }
            if let Some(lines) = new_lines {
                order.lines = lines;
            }
        }
        if changes.status.is_some_and(OrderStatus::releases_table) {
            release(&mut state, table_number, id);
        }
        Ok(OrderWrite::Applied { order_id: id })
    }

    async fn update_order_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> Result<OrderWrite, RepoError> {
        let mut state = self.state.lock().unwrap();
        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(OrderWrite::OrderNotFound);
        };
        order.status = status;
        let table_number = order.table_number;
        if status.releases_table() {
            release(&mut state, table_number, id);
        }
        Ok(OrderWrite::Applied { order_id: id })
    }

    async fn transfer_order(&self, id: i64, waiter_id: i64) -> Result<OrderWrite, RepoError> {
        let mut state = self.state.lock().unwrap();
        if !state.orders.contains_key(&id) {
            return Ok(OrderWrite::OrderNotFound);
        }
        let is_waiter = matches!(state.users.get(&waiter_id), Some((_, UserRole::Waiter)));
        if !is_waiter {
            return Ok(OrderWrite::WaiterNotFound { waiter_id });
        }
        if let Some(order) = state.orders.get_mut(&id) {
            order.waiter_id = Some(waiter_id);
        }
        Ok(OrderWrite::Applied { order_id: id })
    }

    async fn delete_order(&self, id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.lock().unwrap();
        let Some(order) = state.orders.remove(&id) else {
            return Ok(false);
        };
        release(&mut state, order.table_number, id);
        Ok(true)
    }

    async fn delete_orphaned_orders(&self) -> Result<u64, RepoError> {
        let mut state = self.state.lock().unwrap();
        let orphans: Vec<(i64, i32)> = state
            .orders
            .iter()
            .filter(|(_, order)| order.waiter_id.is_none())
            .map(|(id, order)| (*id, order.table_number))
            .collect();
        for (id, table_number) in &orphans {
            state.orders.remove(id);
            release(&mut state, *table_number, *id);
        }
        Ok(orphans.len() as u64)
    }
}

#[async_trait]
impl HealthRepo for InMemoryRestaurant {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepoError::Timeout)
        }
    }
}

/// Everything an HTTP test needs: the router state plus handles on both stores.
pub struct TestApp {
    pub state: ApiState,
    pub restaurant: Arc<InMemoryRestaurant>,
    pub backend: Arc<MemoryBackend>,
}

pub fn test_app(policy: RateLimitPolicy) -> TestApp {
    let restaurant = Arc::new(InMemoryRestaurant::new(10));
    let backend = Arc::new(MemoryBackend::new());
    let cache = CacheLayer::with_backend(backend.clone(), &CacheConfig::default());

    let state = ApiState {
        menu: Arc::new(MenuService::new(
            restaurant.clone(),
            cache.dishes.clone(),
            cache.views.clone(),
        )),
        tables: Arc::new(TableService::new(restaurant.clone(), cache.tables.clone())),
        orders: Arc::new(OrderService::new(
            restaurant.clone(),
            cache.orders.clone(),
            cache.tables.clone(),
        )),
        health: restaurant.clone(),
        rate_limit: policy,
        cache,
    };

    TestApp {
        state,
        restaurant,
        backend,
    }
}
