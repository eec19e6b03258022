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
    dto::{
        announcements::{AnnouncementList, CreateAnnouncementRequest, UnpublishedProductList},
        auth::{LoginRequest, LoginResponse},
        brands::{BrandList, CreateBrandRequest},
        cart::{AddToCartRequest, CartList, UpdateCartItemRequest},
        orders::{
            CancelOrderRequest, CreateOrderRequest, OrderLineRequest, OrderList, OrderStatistics,
            OrderWithItems, UpdateOrderStatusRequest,
        },
        products::{ProductList, ProductUploadForm},
        telegram::{
            BroadcastResult, ChannelMessageRequest, MessageRequest, SendProductsRequest,
            SendProductsResult, SendResult, TelegramErrorGroup, TelegramErrorList, TelegramStatus,
        },
        users::{
            AdminCheckResponse, ChangePasswordRequest, CreateUserRequest, LinkTelegramRequest,
            TelegramRegisterRequest, UpdateUserRequest, UserList,
        },
    },
    models::{Announcement, Brand, CartItem, Order, OrderItem, Product, TelegramErrorEntry, User},
    order_status::OrderStatus,
    response::{ApiResponse, Meta},
    routes::{
        announcements, auth, brands, cart, colors, health, orders, params, products, telegram,
        telegram_errors, users,
    },
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
        auth::login,
        auth::me,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::publish_product,
        products::list_all_products,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::create_order,
        orders::list_orders,
        orders::list_user_orders,
        orders::order_statistics,
        orders::get_order,
        orders::get_order_public,
        orders::cancel_order,
        orders::update_order_status,
        orders::update_order_status_public,
        users::list_users,
        users::create_user,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::change_password,
        users::link_telegram,
        users::register_telegram,
        users::is_telegram_admin,
        announcements::list_announcements,
        announcements::create_announcement,
        announcements::unpublished_products,
        announcements::get_announcement,
        announcements::delete_announcement,
        brands::list_brands,
        brands::create_brand,
        brands::get_brand,
        colors::list_colors,
        telegram::broadcast,
        telegram::send_message,
        telegram::post_to_channel,
        telegram::send_products,
        telegram::status,
        telegram_errors::list_errors,
        telegram_errors::delete_error,
        telegram_errors::delete_all_errors
    ),
    components(
        schemas(
            User,
            Product,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            Announcement,
            Brand,
            TelegramErrorEntry,
            LoginRequest,
            LoginResponse,
            ProductList,
            ProductUploadForm,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartList,
            OrderLineRequest,
            CreateOrderRequest,
            CancelOrderRequest,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            OrderStatistics,
            CreateUserRequest,
            UpdateUserRequest,
            ChangePasswordRequest,
            LinkTelegramRequest,
            TelegramRegisterRequest,
            AdminCheckResponse,
            UserList,
            CreateAnnouncementRequest,
            AnnouncementList,
            UnpublishedProductList,
            CreateBrandRequest,
            BrandList,
            MessageRequest,
            ChannelMessageRequest,
            SendProductsRequest,
            SendResult,
            BroadcastResult,
            SendProductsResult,
            TelegramStatus,
            TelegramErrorGroup,
            TelegramErrorList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<OrderStatistics>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Session cart with stock reservations"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Users", description = "User management and Telegram linking"),
        (name = "Announcements", description = "Scheduled Telegram announcements"),
        (name = "Brands", description = "Brand reference list"),
        (name = "Colors", description = "Color palette"),
        (name = "Telegram", description = "Telegram sending and error log"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
