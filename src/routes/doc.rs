use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    cart::CartLineSnapshot,
    dto::{
        customers::CustomerList,
        orders::{
            CheckoutOutcome, OrderItemDetail, OrderList, OrderSummary, OrderWithItems,
            ReconcileOutcome,
        },
        products::ProductList,
    },
    models::{Customer, Order, OrderItem, Product},
    response::{ApiResponse, PageMeta},
    routes::{customers, health, health::HealthData, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::restock_product,
        customers::list_customers,
        customers::get_customer,
        customers::create_customer,
        customers::update_customer,
        customers::find_or_create_customer,
        orders::list_orders,
        orders::get_order,
        orders::quick_sale,
        orders::open_tab,
        orders::quick_add_item,
        orders::close_order,
        orders::reconcile_order
    ),
    components(
        schemas(
            HealthData,
            Product,
            Customer,
            Order,
            OrderItem,
            CartLineSnapshot,
            ProductList,
            CustomerList,
            OrderList,
            OrderSummary,
            OrderItemDetail,
            OrderWithItems,
            CheckoutOutcome,
            ReconcileOutcome,
            params::Pagination,
            params::ProductQuery,
            params::CustomerQuery,
            params::OrderListQuery,
            PageMeta,
            ApiResponse<HealthData>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Customer>,
            ApiResponse<CustomerList>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderItem>,
            ApiResponse<CheckoutOutcome>,
            ApiResponse<ReconcileOutcome>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product catalog and stock"),
        (name = "Customers", description = "Customer records"),
        (name = "Orders", description = "Quick sales, running tabs, checkout"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
